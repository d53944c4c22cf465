pub use sea_orm_migration::prelude::*;

mod m20251018_000001_create_users;
mod m20251018_000002_create_login_codes;
mod m20251018_000003_create_ip_bans;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20251018_000001_create_users::Migration),
            Box::new(m20251018_000002_create_login_codes::Migration),
            Box::new(m20251018_000003_create_ip_bans::Migration),
        ]
    }
}
