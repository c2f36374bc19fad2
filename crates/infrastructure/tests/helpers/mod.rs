pub mod dns_server_mock;
pub mod overlay_mock;
