use crate::api::error::AppError;
use crate::entities::{prelude::*, *};
use crate::models::{AccessDecision, ExpiredReason, ExpiryMode, LinkStatus};
use crate::utils::clock::Clock;
use chrono::{DateTime, Duration, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseBackend, DatabaseConnection,
    EntityTrait, QueryFilter, Set, Statement, TryInsertResult,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Conditional session/first-open writes are idempotent, so transient store
/// errors are retried a few times before surfacing.
const CONDITIONAL_WRITE_RETRIES: usize = 3;

/// Outcome of the public resolve operation. Expired/revoked are normal
/// results here, not errors: the viewer endpoint renders them as a
/// structured denial payload.
#[derive(Debug, Clone)]
pub struct ResolveOutcome {
    pub link: links::Model,
    pub decision: AccessDecision,
}

/// A fetch that passed the gate: the link plus the document to stream.
#[derive(Debug, Clone)]
pub struct FetchGrant {
    pub link: links::Model,
    pub document: documents::Model,
}

/// Viewer-facing pipeline: session resolution, expiry evaluation and access
/// recording for the two-phase resolve/fetch protocol.
pub struct AccessService {
    db: DatabaseConnection,
    clock: Arc<dyn Clock>,
    log_cap: u64,
}

impl AccessService {
    pub fn new(db: DatabaseConnection, clock: Arc<dyn Clock>, log_cap: u64) -> Self {
        Self { db, clock, log_cap }
    }

    /// Pure decision function over one link, one viewer's session (if any)
    /// and one instant. Never touches the store.
    ///
    /// Rule order: revocation is terminal and beats everything; an inactive
    /// owner expires the link for viewers regardless of time; a persisted
    /// `expired` status short-circuits recomputation; otherwise the expiry
    /// mode decides.
    pub fn evaluate(
        link: &links::Model,
        session: Option<&viewer_sessions::Model>,
        owner_entitled: bool,
        now: DateTime<Utc>,
    ) -> AccessDecision {
        if link.status == LinkStatus::Revoked.as_str() {
            return AccessDecision::Revoked;
        }
        if !owner_entitled {
            return AccessDecision::Expired {
                reason: ExpiredReason::OwnerInactive,
            };
        }
        if link.status == LinkStatus::Expired.as_str() {
            return AccessDecision::Expired {
                reason: ExpiredReason::DeadlinePassed,
            };
        }

        match ExpiryMode::parse(&link.expiry_mode).unwrap_or(ExpiryMode::Manual) {
            ExpiryMode::Manual => AccessDecision::Active {
                deadline: None,
                remaining_seconds: None,
            },
            ExpiryMode::Fixed => match link.fixed_deadline {
                Some(deadline) if now >= deadline => AccessDecision::Expired {
                    reason: ExpiredReason::DeadlinePassed,
                },
                Some(deadline) => AccessDecision::Active {
                    deadline: Some(deadline),
                    remaining_seconds: Some((deadline - now).num_seconds().max(0)),
                },
                // No deadline recorded: nothing to compare against
                None => AccessDecision::Active {
                    deadline: None,
                    remaining_seconds: None,
                },
            },
            ExpiryMode::Countdown => match session {
                None => AccessDecision::SessionRequired,
                Some(s) if now >= s.deadline => AccessDecision::Expired {
                    reason: ExpiredReason::ViewerWindowClosed,
                },
                Some(s) => AccessDecision::Active {
                    deadline: Some(s.deadline),
                    remaining_seconds: Some((s.deadline - now).num_seconds().max(0)),
                },
            },
        }
    }

    /// Phase one of viewer access: evaluates the link for this viewer,
    /// establishing a countdown session on first access, and records the
    /// access when the result is active.
    pub async fn resolve(
        &self,
        token: &str,
        viewer_ip: &str,
        user_agent: Option<String>,
    ) -> Result<ResolveOutcome, AppError> {
        let link = self.find_by_token(token).await?;
        let now = self.clock.now();

        if link.status == LinkStatus::Revoked.as_str() {
            return Ok(ResolveOutcome {
                decision: AccessDecision::Revoked,
                link,
            });
        }

        let entitled = self.owner_entitled(&link.owner_id).await?;

        // A session only starts while the link is still viewable
        let session = if entitled && link.expiry_mode == ExpiryMode::Countdown.as_str() {
            Some(self.resolve_session(&link, viewer_ip, now).await?)
        } else {
            None
        };

        let decision = Self::evaluate(&link, session.as_ref(), entitled, now);

        match decision {
            AccessDecision::Active { .. } => {
                self.record_access(&link, viewer_ip, user_agent, now).await?;
            }
            AccessDecision::Expired {
                reason: ExpiredReason::DeadlinePassed,
            } => {
                // Fixed-mode expiry is link-global; persist it so later
                // lookups short-circuit without recomputation
                self.mark_expired(&link.id).await?;
            }
            _ => {}
        }

        Ok(ResolveOutcome { link, decision })
    }

    /// Phase two: re-evaluates using existing state only. Never creates a
    /// session; a countdown viewer who skipped resolve gets
    /// `SessionNotEstablished` instead of content.
    pub async fn fetch(&self, token: &str, viewer_ip: &str) -> Result<FetchGrant, AppError> {
        let link = self.find_by_token(token).await?;
        let now = self.clock.now();
        let entitled = self.owner_entitled(&link.owner_id).await?;

        let session = if link.expiry_mode == ExpiryMode::Countdown.as_str() {
            ViewerSessions::find_by_id((link.id.clone(), viewer_ip.to_string()))
                .one(&self.db)
                .await?
        } else {
            None
        };

        match Self::evaluate(&link, session.as_ref(), entitled, now) {
            AccessDecision::Active { .. } => {
                let document = Documents::find_by_id(link.document_id.as_str())
                    .one(&self.db)
                    .await?
                    .ok_or(AppError::NotFound("Document not found".to_string()))?;
                Ok(FetchGrant { link, document })
            }
            AccessDecision::SessionRequired => Err(AppError::SessionNotEstablished(
                "Access the link before fetching its content".to_string(),
            )),
            AccessDecision::Expired { reason } => {
                if reason == ExpiredReason::DeadlinePassed {
                    self.mark_expired(&link.id).await?;
                }
                // An inactive owner always gets the stock message; custom
                // branding only applies to time-based denials
                let message = link
                    .custom_expired_message
                    .clone()
                    .filter(|_| reason != ExpiredReason::OwnerInactive)
                    .unwrap_or_else(|| reason.default_message().to_string());
                Err(AppError::Gone(message))
            }
            // Revoked tokens are indistinguishable from missing ones here
            AccessDecision::Revoked => Err(AppError::NotFound("Link not found".to_string())),
        }
    }

    /// Returns this viewer's countdown session, creating it on first access.
    ///
    /// The insert is a set-if-absent on `(link_id, viewer_ip)`: when N
    /// requests from one viewer race, exactly one wins and the read-back
    /// hands every caller the winner's deadline. An established deadline is
    /// never extended or reset.
    async fn resolve_session(
        &self,
        link: &links::Model,
        viewer_ip: &str,
        now: DateTime<Utc>,
    ) -> Result<viewer_sessions::Model, AppError> {
        if let Some(existing) = ViewerSessions::find_by_id((link.id.clone(), viewer_ip.to_string()))
            .one(&self.db)
            .await?
        {
            return Ok(existing);
        }

        let window = Duration::seconds(link.countdown_seconds.unwrap_or(0));
        let session = viewer_sessions::ActiveModel {
            link_id: Set(link.id.clone()),
            viewer_ip: Set(viewer_ip.to_string()),
            started_at: Set(now),
            deadline: Set(now + window),
        };

        let mut attempt = 0;
        let inserted = loop {
            let res = ViewerSessions::insert(session.clone())
                .on_conflict(
                    OnConflict::columns([
                        viewer_sessions::Column::LinkId,
                        viewer_sessions::Column::ViewerIp,
                    ])
                    .do_nothing()
                    .to_owned(),
                )
                .do_nothing()
                .exec(&self.db)
                .await;
            match res {
                Ok(outcome) => break !matches!(outcome, TryInsertResult::Conflicted),
                Err(e) => {
                    attempt += 1;
                    if attempt >= CONDITIONAL_WRITE_RETRIES {
                        return Err(e.into());
                    }
                    warn!(link_id = %link.id, error = %e, "Retrying viewer session insert");
                }
            }
        };

        if inserted {
            info!(link_id = %link.id, viewer_ip = %viewer_ip, "Viewer session started");
            self.stamp_first_opened(&link.id, now).await?;
        }

        ViewerSessions::find_by_id((link.id.clone(), viewer_ip.to_string()))
            .one(&self.db)
            .await?
            .ok_or(AppError::Internal(
                "Viewer session missing after insert".to_string(),
            ))
    }

    /// Sets `first_opened_at` once, for the first session created across all
    /// viewers of the link. Conditional on NULL, so racing creators cannot
    /// produce two different first timestamps.
    async fn stamp_first_opened(&self, link_id: &str, now: DateTime<Utc>) -> Result<(), AppError> {
        let mut last_err = None;
        for _ in 0..CONDITIONAL_WRITE_RETRIES {
            let res = Links::update_many()
                .col_expr(links::Column::FirstOpenedAt, Expr::value(now))
                .filter(links::Column::Id.eq(link_id))
                .filter(links::Column::FirstOpenedAt.is_null())
                .exec(&self.db)
                .await;
            match res {
                Ok(_) => return Ok(()),
                Err(e) => {
                    warn!(link_id = %link_id, error = %e, "Retrying first-opened stamp");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err
            .map(AppError::from)
            .unwrap_or(AppError::Internal("unreachable".to_string())))
    }

    /// Records one successful view: atomic counter increment, idempotent
    /// unique-viewer set-add, bounded log append.
    async fn record_access(
        &self,
        link: &links::Model,
        viewer_ip: &str,
        user_agent: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        Links::update_many()
            .col_expr(
                links::Column::OpenCount,
                Expr::col(links::Column::OpenCount).add(1),
            )
            .filter(links::Column::Id.eq(&link.id))
            .exec(&self.db)
            .await?;

        let viewer = link_viewers::ActiveModel {
            link_id: Set(link.id.clone()),
            viewer_ip: Set(viewer_ip.to_string()),
            first_seen_at: Set(now),
        };
        LinkViewers::insert(viewer)
            .on_conflict(
                OnConflict::columns([
                    link_viewers::Column::LinkId,
                    link_viewers::Column::ViewerIp,
                ])
                .do_nothing()
                .to_owned(),
            )
            .do_nothing()
            .exec(&self.db)
            .await?;

        let entry = access_log_entries::ActiveModel {
            link_id: Set(link.id.clone()),
            viewer_ip: Set(viewer_ip.to_string()),
            user_agent: Set(user_agent),
            accessed_at: Set(now),
            ..Default::default()
        };
        entry.insert(&self.db).await?;
        self.truncate_log(&link.id).await?;

        Ok(())
    }

    /// Keeps only the newest `log_cap` entries for a link. FIFO by insertion
    /// id, independent of timestamp skew.
    async fn truncate_log(&self, link_id: &str) -> Result<(), AppError> {
        let backend = self.db.get_database_backend();
        let sql = match backend {
            DatabaseBackend::Postgres => {
                "DELETE FROM access_log_entries WHERE link_id = $1 AND id NOT IN \
                 (SELECT id FROM access_log_entries WHERE link_id = $2 ORDER BY id DESC LIMIT $3)"
            }
            _ => {
                "DELETE FROM access_log_entries WHERE link_id = ? AND id NOT IN \
                 (SELECT id FROM access_log_entries WHERE link_id = ? ORDER BY id DESC LIMIT ?)"
            }
        };
        self.db
            .execute(Statement::from_sql_and_values(
                backend,
                sql,
                [
                    link_id.into(),
                    link_id.into(),
                    (self.log_cap as i64).into(),
                ],
            ))
            .await?;
        Ok(())
    }

    /// Flips an active link to expired. Revoked links are never overwritten.
    async fn mark_expired(&self, link_id: &str) -> Result<(), AppError> {
        Links::update_many()
            .col_expr(
                links::Column::Status,
                Expr::value(LinkStatus::Expired.as_str()),
            )
            .filter(links::Column::Id.eq(link_id))
            .filter(links::Column::Status.eq(LinkStatus::Active.as_str()))
            .exec(&self.db)
            .await?;
        info!(link_id = %link_id, "Link expired (fixed deadline passed)");
        Ok(())
    }

    /// Unknown and deleted tokens get the same answer, so the response does
    /// not leak whether a link ever existed.
    async fn find_by_token(&self, token: &str) -> Result<links::Model, AppError> {
        Links::find()
            .filter(links::Column::Token.eq(token))
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound("Link not found".to_string()))
    }

    /// Owner entitlement is an opaque boolean from this engine's point of
    /// view. A missing owner counts as not entitled.
    async fn owner_entitled(&self, owner_id: &str) -> Result<bool, AppError> {
        let user = Users::find_by_id(owner_id).one(&self.db).await?;
        Ok(user.is_some_and(|u| u.subscription_status == "active"))
    }
}
