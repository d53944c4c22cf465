use sea_orm::entity::prelude::*;

/// The single allow-listed identity, keyed by its Telegram chat id.
/// Created on the first matching login request and never deleted.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub delivery_address: String,
    pub is_active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub last_login_at: Option<chrono::DateTime<chrono::Utc>>,
    pub last_login_request_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::login_codes::Entity")]
    LoginCodes,
}

impl Related<super::login_codes::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LoginCodes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
