//! Admin dashboard aggregates

use std::{collections::BTreeMap, sync::Arc};

use chrono::{Duration, NaiveDate};
use elite_common::utils::utc_now;
use elite_persistence::{
    KycStatus, PersistenceService, TransactionQuery, TransactionStatus, UserQuery,
};
use serde::Serialize;

/// Days covered by the growth and volume series, today included
pub const SERIES_DAYS: i64 = 31;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyVolume {
    pub date: NaiveDate,
    pub volume_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub total_users: u64,
    pub total_transactions: u64,
    /// Sum of completed transactions
    pub total_volume_cents: i64,
    pub pending_kyc: u64,
    pub new_users_today: u64,
    /// Fees are not charged, so this stays zero
    pub revenue_today_cents: i64,
    pub user_growth: Vec<DailyCount>,
    pub transaction_volume: Vec<DailyVolume>,
}

fn series_days(today: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    (0..SERIES_DAYS)
        .rev()
        .map(move |offset| today - Duration::days(offset))
}

#[derive(Clone)]
pub struct AnalyticsService {
    persistence: Arc<dyn PersistenceService>,
}

impl AnalyticsService {
    pub fn new(persistence: Arc<dyn PersistenceService>) -> Self {
        Self { persistence }
    }

    pub async fn dashboard(&self) -> anyhow::Result<Dashboard> {
        let today = utc_now().date();
        let first_day = today - Duration::days(SERIES_DAYS - 1);
        let since = first_day.and_hms_opt(0, 0, 0).unwrap_or_default();

        let total_users = self.persistence.user_count(&UserQuery::default()).await?;
        let pending_kyc = self
            .persistence
            .user_count(&UserQuery {
                kyc_status: Some(KycStatus::Submitted),
                ..Default::default()
            })
            .await?;
        let all = self
            .persistence
            .transaction_summary(&TransactionQuery::default())
            .await?;
        let completed = self
            .persistence
            .transaction_summary(&TransactionQuery {
                status: Some(TransactionStatus::Completed),
                ..Default::default()
            })
            .await?;

        let mut signups: BTreeMap<NaiveDate, u64> = BTreeMap::new();
        for created_at in self.persistence.user_created_since(since).await? {
            *signups.entry(created_at.date()).or_default() += 1;
        }

        let mut volume: BTreeMap<NaiveDate, i64> = BTreeMap::new();
        for txn in self.persistence.transaction_find_since(since).await? {
            if txn.status == TransactionStatus::Completed {
                *volume.entry(txn.created_at.date()).or_default() += txn.amount_cents;
            }
        }

        let user_growth = series_days(today)
            .map(|date| DailyCount {
                date,
                count: signups.get(&date).copied().unwrap_or(0),
            })
            .collect();
        let transaction_volume = series_days(today)
            .map(|date| DailyVolume {
                date,
                volume_cents: volume.get(&date).copied().unwrap_or(0),
            })
            .collect();

        Ok(Dashboard {
            total_users,
            total_transactions: all.count,
            total_volume_cents: completed.total_amount_cents,
            pending_kyc,
            new_users_today: signups.get(&today).copied().unwrap_or(0),
            revenue_today_cents: 0,
            user_growth,
            transaction_volume,
        })
    }
}

#[cfg(test)]
mod tests {
    use elite_persistence::{
        EmbeddedPersistService, NewAccount, NewTransaction, NewUser, Posting, TransactionKind,
        UserPatch,
    };
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_series_days_ends_today() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let days: Vec<_> = series_days(today).collect();
        assert_eq!(days.len(), 31);
        assert_eq!(days[0], NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
        assert_eq!(days[30], today);
    }

    #[tokio::test]
    async fn test_dashboard_counts() {
        let dir = TempDir::new().unwrap();
        let persistence: Arc<dyn PersistenceService> =
            Arc::new(EmbeddedPersistService::open(dir.path()).unwrap());

        let user = persistence
            .user_create(NewUser {
                email: "a@example.com".to_string(),
                password_hash: "x".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        let other = persistence
            .user_create(NewUser {
                email: "b@example.com".to_string(),
                password_hash: "x".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        persistence
            .user_update(
                other.id,
                &UserPatch {
                    kyc_status: Some(KycStatus::Submitted),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let account = persistence
            .account_create(NewAccount {
                user_id: user.id,
                account_number: "1000000001".to_string(),
                currency: "NGN".to_string(),
                account_type: "savings".to_string(),
            })
            .await
            .unwrap();

        let deposit = |status, reference: &str| NewTransaction {
            user_id: user.id,
            from_account_id: None,
            to_account_id: Some(account.id),
            amount_cents: 2_500,
            kind: TransactionKind::Deposit,
            status,
            reference: reference.to_string(),
            method: "manual".to_string(),
            extra_data: json!({}),
        };
        persistence
            .ledger_post(
                deposit(TransactionStatus::Completed, "REF-1"),
                &[Posting::credit(account.id, 2_500)],
            )
            .await
            .unwrap();
        persistence
            .ledger_post(deposit(TransactionStatus::Pending, "REF-2"), &[])
            .await
            .unwrap();

        let dashboard = AnalyticsService::new(persistence).dashboard().await.unwrap();
        assert_eq!(dashboard.total_users, 2);
        assert_eq!(dashboard.pending_kyc, 1);
        assert_eq!(dashboard.new_users_today, 2);
        assert_eq!(dashboard.total_transactions, 2);
        assert_eq!(dashboard.total_volume_cents, 2_500);
        assert_eq!(dashboard.revenue_today_cents, 0);
        assert_eq!(dashboard.user_growth.len(), 31);
        assert_eq!(dashboard.user_growth[30].count, 2);
        assert_eq!(dashboard.transaction_volume[30].volume_cents, 2_500);
        assert_eq!(dashboard.transaction_volume[0].volume_cents, 0);
    }
}
