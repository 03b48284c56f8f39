// Services module - Business logic

pub mod csv_export;
pub mod kiosk_qr;
pub mod navigation;
pub mod oauth;
pub mod role_resolver;
pub mod view_filter;
