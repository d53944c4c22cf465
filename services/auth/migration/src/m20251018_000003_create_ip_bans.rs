use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(IpBans::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(IpBans::Id).uuid().not_null().primary_key())
                    // 45 chars fits the longest IPv6 text form (IPv4-mapped).
                    .col(
                        ColumnDef::new(IpBans::IpAddress)
                            .string_len(45)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(IpBans::FailedAttempts)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(ColumnDef::new(IpBans::BannedUntil).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(IpBans::FirstAttemptAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(IpBans::LastAttemptAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(IpBans::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum IpBans {
    Table,
    Id,
    IpAddress,
    FailedAttempts,
    BannedUntil,
    FirstAttemptAt,
    LastAttemptAt,
}
