use anyhow::Context as _;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict, Query};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, DatabaseTransaction,
    DbErr, EntityTrait, QueryFilter, TransactionTrait,
};
use uuid::Uuid;

use tabi_auth_schema::{ip_bans, login_codes, users};

use crate::domain::repository::{IdentityRepository, IpBanRepository, LoginCodeRepository};
use crate::domain::types::{BanPolicy, Identity, IpBan, LoginCode};
use crate::error::AuthServiceError;

// ── Identity repository ───────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbIdentityRepository {
    pub db: DatabaseConnection,
}

impl IdentityRepository for DbIdentityRepository {
    async fn get_or_create(
        &self,
        delivery_address: &str,
        now: DateTime<Utc>,
    ) -> Result<Identity, AuthServiceError> {
        let identity = Identity::new(delivery_address, now);
        let identity = self
            .db
            .transaction::<_, Identity, DbErr>(|txn| {
                Box::pin(async move {
                    // Write first so concurrent requests queue on the SQLite write lock.
                    users::Entity::insert(users::ActiveModel {
                        id: Set(identity.id),
                        delivery_address: Set(identity.delivery_address.clone()),
                        is_active: Set(identity.is_active),
                        created_at: Set(identity.created_at),
                        last_login_at: Set(identity.last_login_at),
                        last_login_request_at: Set(identity.last_login_request_at),
                    })
                    .on_conflict(
                        OnConflict::column(users::Column::DeliveryAddress)
                            .update_column(users::Column::LastLoginRequestAt)
                            .to_owned(),
                    )
                    .exec_without_returning(txn)
                    .await?;

                    let model = users::Entity::find()
                        .filter(
                            users::Column::DeliveryAddress.eq(identity.delivery_address.as_str()),
                        )
                        .one(txn)
                        .await?
                        .ok_or_else(|| DbErr::RecordNotFound("identity after upsert".to_owned()))?;
                    Ok(identity_from_model(model))
                })
            })
            .await
            .context("get or create identity")?;
        Ok(identity)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, AuthServiceError> {
        let model = users::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .context("find identity by id")?;
        Ok(model.map(identity_from_model))
    }
}

fn identity_from_model(model: users::Model) -> Identity {
    Identity {
        id: model.id,
        delivery_address: model.delivery_address,
        is_active: model.is_active,
        created_at: model.created_at,
        last_login_at: model.last_login_at,
        last_login_request_at: model.last_login_request_at,
    }
}

// ── Login code repository ─────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbLoginCodeRepository {
    pub db: DatabaseConnection,
}

impl LoginCodeRepository for DbLoginCodeRepository {
    async fn replace_active(&self, code: &LoginCode) -> Result<(), AuthServiceError> {
        self.db
            .transaction::<_, (), DbErr>(|txn| {
                let code = code.clone();
                Box::pin(async move {
                    login_codes::Entity::update_many()
                        .col_expr(login_codes::Column::IsUsed, Expr::value(true))
                        .filter(login_codes::Column::UserId.eq(code.identity_id))
                        .filter(login_codes::Column::IsUsed.eq(false))
                        .exec(txn)
                        .await?;
                    insert_login_code(txn, &code).await?;
                    Ok(())
                })
            })
            .await
            .context("replace active login code")?;
        Ok(())
    }

    async fn consume(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Identity>, AuthServiceError> {
        let code = code.to_owned();
        let identity = self
            .db
            .transaction::<_, Option<Identity>, DbErr>(|txn| {
                Box::pin(async move {
                    // Claim one live code in a single UPDATE; a second caller finds nothing.
                    let claimed = login_codes::Entity::update_many()
                        .col_expr(login_codes::Column::IsUsed, Expr::value(true))
                        .col_expr(login_codes::Column::UsedAt, Expr::value(now))
                        .filter(
                            login_codes::Column::Id.in_subquery(
                                Query::select()
                                    .column(login_codes::Column::Id)
                                    .from(login_codes::Entity)
                                    .and_where(Expr::col(login_codes::Column::Code).eq(code.as_str()))
                                    .and_where(Expr::col(login_codes::Column::IsUsed).eq(false))
                                    .and_where(Expr::col(login_codes::Column::ExpiresAt).gt(now))
                                    .limit(1)
                                    .to_owned(),
                            ),
                        )
                        .exec(txn)
                        .await?;
                    if claimed.rows_affected == 0 {
                        return Ok(None);
                    }

                    let Some(found) = login_codes::Entity::find()
                        .filter(login_codes::Column::Code.eq(code.as_str()))
                        .filter(login_codes::Column::IsUsed.eq(true))
                        .filter(login_codes::Column::UsedAt.eq(now))
                        .one(txn)
                        .await?
                    else {
                        return Ok(None);
                    };

                    let Some(user) = users::Entity::find_by_id(found.user_id).one(txn).await?
                    else {
                        return Ok(None);
                    };
                    let mut active: users::ActiveModel = user.into();
                    active.last_login_at = Set(Some(now));
                    let user = active.update(txn).await?;
                    Ok(Some(identity_from_model(user)))
                })
            })
            .await
            .context("consume login code")?;
        Ok(identity)
    }
}

async fn insert_login_code(
    txn: &DatabaseTransaction,
    code: &LoginCode,
) -> Result<(), DbErr> {
    login_codes::ActiveModel {
        id: Set(code.id),
        user_id: Set(code.identity_id),
        code: Set(code.code.clone()),
        expires_at: Set(code.expires_at),
        is_used: Set(code.is_used),
        used_at: Set(code.used_at),
        created_at: Set(code.created_at),
    }
    .insert(txn)
    .await?;
    Ok(())
}

// ── IP ban repository ─────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbIpBanRepository {
    pub db: DatabaseConnection,
}

impl IpBanRepository for DbIpBanRepository {
    async fn find(&self, ip_address: &str) -> Result<Option<IpBan>, AuthServiceError> {
        let model = ip_bans::Entity::find()
            .filter(ip_bans::Column::IpAddress.eq(ip_address))
            .one(&self.db)
            .await
            .context("find ip ban")?;
        Ok(model.map(ip_ban_from_model))
    }

    async fn record_failure(
        &self,
        ip_address: &str,
        now: DateTime<Utc>,
        policy: &BanPolicy,
    ) -> Result<IpBan, AuthServiceError> {
        // First failure as a fresh row; the conflict branch applies the same rule to the
        // stored counter in one statement.
        let first = policy.register_failure(None, ip_address, now);
        let max_attempts = i32::try_from(policy.max_attempts).unwrap_or(i32::MAX);
        let next_attempts = Expr::col(ip_bans::Column::FailedAttempts).add(1);
        let ban_starts = Expr::expr(next_attempts.clone()).gte(max_attempts).and(
            Expr::col(ip_bans::Column::BannedUntil)
                .is_null()
                .or(Expr::col(ip_bans::Column::BannedUntil).lte(now)),
        );
        let banned_until = Expr::case(ban_starts, Expr::value(now + policy.ban_duration))
            .finally(Expr::col(ip_bans::Column::BannedUntil));
        let on_conflict = OnConflict::column(ip_bans::Column::IpAddress)
            .value(ip_bans::Column::FailedAttempts, next_attempts)
            .value(ip_bans::Column::BannedUntil, banned_until)
            .update_column(ip_bans::Column::LastAttemptAt)
            .to_owned();

        let ban = self
            .db
            .transaction::<_, IpBan, DbErr>(|txn| {
                Box::pin(async move {
                    ip_bans::Entity::insert(ip_bans::ActiveModel {
                        id: Set(first.id),
                        ip_address: Set(first.ip_address.clone()),
                        failed_attempts: Set(1),
                        banned_until: Set(first.banned_until),
                        first_attempt_at: Set(first.first_attempt_at),
                        last_attempt_at: Set(first.last_attempt_at),
                    })
                    .on_conflict(on_conflict)
                    .exec_without_returning(txn)
                    .await?;

                    let model = ip_bans::Entity::find()
                        .filter(ip_bans::Column::IpAddress.eq(first.ip_address.as_str()))
                        .one(txn)
                        .await?
                        .ok_or_else(|| DbErr::RecordNotFound("ip ban after upsert".to_owned()))?;
                    Ok(ip_ban_from_model(model))
                })
            })
            .await
            .context("record failed login attempt")?;
        Ok(ban)
    }

    async fn clear(&self, ip_address: &str) -> Result<(), AuthServiceError> {
        ip_bans::Entity::delete_many()
            .filter(ip_bans::Column::IpAddress.eq(ip_address))
            .exec(&self.db)
            .await
            .context("clear ip ban")?;
        Ok(())
    }
}

fn ip_ban_from_model(model: ip_bans::Model) -> IpBan {
    IpBan {
        id: model.id,
        ip_address: model.ip_address,
        failed_attempts: u32::try_from(model.failed_attempts).unwrap_or(0),
        banned_until: model.banned_until,
        first_attempt_at: model.first_attempt_at,
        last_attempt_at: model.last_attempt_at,
    }
}
