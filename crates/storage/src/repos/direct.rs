//! Direct account, campaign, and ads-fact repository.

use async_trait::async_trait;
use sqlx::MySqlPool;

use bi_core::{
    DirectAccount, DirectCampaign, DirectCampaignMonthly, DirectTotalsMonthly, Error, Result,
};

use crate::client::Storage;
use crate::repos::map_insert_error;
use crate::stores::{
    CampaignMonthlyUpsert, DirectStore, NewDirectAccount, NewDirectCampaign, TotalsMonthlyUpsert,
};

pub struct DirectRepo {
    pool: MySqlPool,
}

impl DirectRepo {
    pub fn new(storage: &Storage) -> Self {
        Self {
            pool: storage.pool().clone(),
        }
    }
}

#[async_trait]
impl DirectStore for DirectRepo {
    async fn create_account(&self, input: NewDirectAccount) -> Result<DirectAccount> {
        let result = sqlx::query(
            "INSERT INTO direct_accounts (project_id, client_login, account_name) VALUES (?, ?, ?)",
        )
        .bind(input.project_id)
        .bind(&input.client_login)
        .bind(&input.account_name)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, "account with this client login"))?;

        let id = result.last_insert_id() as i64;
        self.get_account(id)
            .await?
            .ok_or_else(|| Error::internal("direct account vanished after insert"))
    }

    async fn get_account(&self, id: i64) -> Result<Option<DirectAccount>> {
        let account =
            sqlx::query_as::<_, DirectAccount>("SELECT * FROM direct_accounts WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(account)
    }

    async fn get_account_by_login(
        &self,
        project_id: i64,
        client_login: &str,
    ) -> Result<Option<DirectAccount>> {
        let account = sqlx::query_as::<_, DirectAccount>(
            "SELECT * FROM direct_accounts WHERE project_id = ? AND client_login = ?",
        )
        .bind(project_id)
        .bind(client_login)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    async fn list_accounts(&self, project_id: i64) -> Result<Vec<DirectAccount>> {
        let accounts = sqlx::query_as::<_, DirectAccount>(
            "SELECT * FROM direct_accounts WHERE project_id = ? ORDER BY id",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(accounts)
    }

    async fn delete_account(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM direct_accounts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found(format!("direct account {id}")));
        }
        Ok(())
    }

    async fn create_campaign(&self, input: NewDirectCampaign) -> Result<DirectCampaign> {
        let result = sqlx::query(
            "INSERT INTO direct_campaigns (direct_account_id, campaign_id, name, status) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(input.direct_account_id)
        .bind(input.campaign_id)
        .bind(&input.name)
        .bind(&input.status)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, "campaign for this account"))?;

        let id = result.last_insert_id() as i64;
        let campaign =
            sqlx::query_as::<_, DirectCampaign>("SELECT * FROM direct_campaigns WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        campaign.ok_or_else(|| Error::internal("direct campaign vanished after insert"))
    }

    async fn get_campaign_by_vendor_id(
        &self,
        direct_account_id: i64,
        campaign_id: i64,
    ) -> Result<Option<DirectCampaign>> {
        let campaign = sqlx::query_as::<_, DirectCampaign>(
            "SELECT * FROM direct_campaigns WHERE direct_account_id = ? AND campaign_id = ?",
        )
        .bind(direct_account_id)
        .bind(campaign_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(campaign)
    }

    async fn list_campaigns_by_account(
        &self,
        direct_account_id: i64,
    ) -> Result<Vec<DirectCampaign>> {
        let campaigns = sqlx::query_as::<_, DirectCampaign>(
            "SELECT * FROM direct_campaigns WHERE direct_account_id = ? ORDER BY id",
        )
        .bind(direct_account_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(campaigns)
    }

    async fn list_campaigns_by_project(&self, project_id: i64) -> Result<Vec<DirectCampaign>> {
        let campaigns = sqlx::query_as::<_, DirectCampaign>(
            "SELECT c.* FROM direct_campaigns c \
             INNER JOIN direct_accounts a ON a.id = c.direct_account_id \
             WHERE a.project_id = ? ORDER BY c.id",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(campaigns)
    }

    async fn upsert_campaign_month(&self, row: CampaignMonthlyUpsert) -> Result<()> {
        sqlx::query(
            "INSERT INTO direct_campaign_monthly \
                (project_id, direct_campaign_id, year, month, \
                 impressions, clicks, ctr_pct, cpc, conversions, cpa, cost) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON DUPLICATE KEY UPDATE \
                impressions = VALUES(impressions), \
                clicks = VALUES(clicks), \
                ctr_pct = VALUES(ctr_pct), \
                cpc = VALUES(cpc), \
                conversions = VALUES(conversions), \
                cpa = VALUES(cpa), \
                cost = VALUES(cost)",
        )
        .bind(row.project_id)
        .bind(row.direct_campaign_id)
        .bind(row.year)
        .bind(row.month)
        .bind(row.impressions)
        .bind(row.clicks)
        .bind(row.ctr_pct)
        .bind(row.cpc)
        .bind(row.conversions)
        .bind(row.cpa)
        .bind(row.cost)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_campaign_month(
        &self,
        project_id: i64,
        direct_campaign_id: i64,
        year: i32,
        month: i32,
    ) -> Result<Option<DirectCampaignMonthly>> {
        let row = sqlx::query_as::<_, DirectCampaignMonthly>(
            "SELECT * FROM direct_campaign_monthly \
             WHERE project_id = ? AND direct_campaign_id = ? AND year = ? AND month = ?",
        )
        .bind(project_id)
        .bind(direct_campaign_id)
        .bind(year)
        .bind(month)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn upsert_totals_month(&self, row: TotalsMonthlyUpsert) -> Result<()> {
        sqlx::query(
            "INSERT INTO direct_totals_monthly \
                (project_id, year, month, \
                 impressions, clicks, ctr_pct, cpc, conversions, cpa, cost) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON DUPLICATE KEY UPDATE \
                impressions = VALUES(impressions), \
                clicks = VALUES(clicks), \
                ctr_pct = VALUES(ctr_pct), \
                cpc = VALUES(cpc), \
                conversions = VALUES(conversions), \
                cpa = VALUES(cpa), \
                cost = VALUES(cost)",
        )
        .bind(row.project_id)
        .bind(row.year)
        .bind(row.month)
        .bind(row.impressions)
        .bind(row.clicks)
        .bind(row.ctr_pct)
        .bind(row.cpc)
        .bind(row.conversions)
        .bind(row.cpa)
        .bind(row.cost)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_totals_month(
        &self,
        project_id: i64,
        year: i32,
        month: i32,
    ) -> Result<Option<DirectTotalsMonthly>> {
        let row = sqlx::query_as::<_, DirectTotalsMonthly>(
            "SELECT * FROM direct_totals_monthly \
             WHERE project_id = ? AND year = ? AND month = ?",
        )
        .bind(project_id)
        .bind(year)
        .bind(month)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}
