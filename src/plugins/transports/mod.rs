pub mod dry_run;
pub mod telegram;

pub use dry_run::DryRunTransport;
pub use telegram::TelegramTransport;
