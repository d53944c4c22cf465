use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(LoginCodes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LoginCodes::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(LoginCodes::UserId).uuid().not_null())
                    .col(ColumnDef::new(LoginCodes::Code).string_len(6).not_null())
                    .col(
                        ColumnDef::new(LoginCodes::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LoginCodes::IsUsed)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(LoginCodes::UsedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(LoginCodes::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(LoginCodes::Table, LoginCodes::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(LoginCodes::Table)
                    .col(LoginCodes::UserId)
                    .name("idx_login_codes_user_id")
                    .to_owned(),
            )
            .await?;

        // Codes are looked up by value alone; values may repeat across identities.
        manager
            .create_index(
                Index::create()
                    .table(LoginCodes::Table)
                    .col(LoginCodes::Code)
                    .name("idx_login_codes_code")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(LoginCodes::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum LoginCodes {
    Table,
    Id,
    UserId,
    Code,
    ExpiresAt,
    IsUsed,
    UsedAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}
