pub mod browser;
pub mod convert;
pub mod gh;
pub mod init;
pub mod jira;
pub mod ui;
