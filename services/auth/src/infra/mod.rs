pub mod db;
pub mod notifier;
