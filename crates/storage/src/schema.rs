//! MySQL table schemas.
//!
//! Every fact table carries a unique index over its natural key; the upsert
//! contract in the repositories depends on those indexes existing.

/// SQL for creating the projects table.
pub const CREATE_PROJECTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS projects (
    id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
    name VARCHAR(255) NOT NULL,
    slug VARCHAR(255) NOT NULL,
    timezone VARCHAR(64) NOT NULL DEFAULT 'Europe/Moscow',
    currency VARCHAR(8) NOT NULL DEFAULT 'RUB',
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
    UNIQUE KEY uq_projects_slug (slug)
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4
"#;

/// SQL for creating the counters table.
pub const CREATE_COUNTERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS counters (
    id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
    project_id BIGINT NOT NULL,
    counter_id BIGINT NOT NULL,
    name VARCHAR(255) NOT NULL DEFAULT '',
    is_primary BOOLEAN NOT NULL DEFAULT FALSE,
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
    UNIQUE KEY uq_counters_project_counter (project_id, counter_id),
    KEY idx_counters_project (project_id),
    CONSTRAINT fk_counters_project FOREIGN KEY (project_id)
        REFERENCES projects (id) ON DELETE CASCADE
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4
"#;

/// SQL for creating the goals table.
pub const CREATE_GOALS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS goals (
    id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
    counter_id BIGINT NOT NULL,
    goal_id BIGINT NOT NULL,
    name VARCHAR(255) NOT NULL DEFAULT '',
    is_conversion BOOLEAN NOT NULL DEFAULT FALSE,
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
    UNIQUE KEY uq_goals_counter_goal (counter_id, goal_id),
    KEY idx_goals_counter (counter_id),
    CONSTRAINT fk_goals_counter FOREIGN KEY (counter_id)
        REFERENCES counters (id) ON DELETE CASCADE
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4
"#;

/// SQL for creating the direct_accounts table.
pub const CREATE_DIRECT_ACCOUNTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS direct_accounts (
    id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
    project_id BIGINT NOT NULL,
    client_login VARCHAR(255) NOT NULL,
    account_name VARCHAR(255) NOT NULL DEFAULT '',
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
    UNIQUE KEY uq_direct_accounts_project_login (project_id, client_login),
    KEY idx_direct_accounts_project (project_id),
    CONSTRAINT fk_direct_accounts_project FOREIGN KEY (project_id)
        REFERENCES projects (id) ON DELETE CASCADE
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4
"#;

/// SQL for creating the direct_campaigns table.
pub const CREATE_DIRECT_CAMPAIGNS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS direct_campaigns (
    id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
    direct_account_id BIGINT NOT NULL,
    campaign_id BIGINT NOT NULL,
    name VARCHAR(255) NOT NULL DEFAULT '',
    status VARCHAR(32) NOT NULL DEFAULT '',
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
    UNIQUE KEY uq_direct_campaigns_account_campaign (direct_account_id, campaign_id),
    KEY idx_direct_campaigns_account (direct_account_id),
    CONSTRAINT fk_direct_campaigns_account FOREIGN KEY (direct_account_id)
        REFERENCES direct_accounts (id) ON DELETE CASCADE
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4
"#;

/// SQL for creating the metrics_monthly fact table.
pub const CREATE_METRICS_MONTHLY_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS metrics_monthly (
    id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
    project_id BIGINT NOT NULL,
    year INT NOT NULL,
    month INT NOT NULL,
    visits BIGINT NOT NULL DEFAULT 0,
    users BIGINT NOT NULL DEFAULT 0,
    bounce_rate DOUBLE NOT NULL DEFAULT 0,
    avg_session_duration_sec BIGINT NOT NULL DEFAULT 0,
    conversions BIGINT NULL,
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    UNIQUE KEY uq_metrics_monthly_nk (project_id, year, month),
    CONSTRAINT fk_metrics_monthly_project FOREIGN KEY (project_id)
        REFERENCES projects (id) ON DELETE CASCADE
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4
"#;

/// SQL for creating the metrics_age_monthly fact table.
pub const CREATE_METRICS_AGE_MONTHLY_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS metrics_age_monthly (
    id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
    project_id BIGINT NOT NULL,
    year INT NOT NULL,
    month INT NOT NULL,
    age_bucket VARCHAR(16) NOT NULL,
    visits BIGINT NOT NULL DEFAULT 0,
    users BIGINT NOT NULL DEFAULT 0,
    bounce_rate DOUBLE NOT NULL DEFAULT 0,
    avg_session_duration_sec BIGINT NOT NULL DEFAULT 0,
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    UNIQUE KEY uq_metrics_age_monthly_nk (project_id, year, month, age_bucket),
    CONSTRAINT fk_metrics_age_monthly_project FOREIGN KEY (project_id)
        REFERENCES projects (id) ON DELETE CASCADE
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4
"#;

/// SQL for creating the direct_campaign_monthly fact table.
pub const CREATE_DIRECT_CAMPAIGN_MONTHLY_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS direct_campaign_monthly (
    id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
    project_id BIGINT NOT NULL,
    direct_campaign_id BIGINT NOT NULL,
    year INT NOT NULL,
    month INT NOT NULL,
    impressions BIGINT NOT NULL DEFAULT 0,
    clicks BIGINT NOT NULL DEFAULT 0,
    ctr_pct DOUBLE NOT NULL DEFAULT 0,
    cpc DOUBLE NOT NULL DEFAULT 0,
    conversions BIGINT NULL,
    cpa DOUBLE NULL,
    cost DOUBLE NOT NULL DEFAULT 0,
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    UNIQUE KEY uq_direct_campaign_monthly_nk (project_id, direct_campaign_id, year, month),
    CONSTRAINT fk_direct_campaign_monthly_project FOREIGN KEY (project_id)
        REFERENCES projects (id) ON DELETE CASCADE,
    CONSTRAINT fk_direct_campaign_monthly_campaign FOREIGN KEY (direct_campaign_id)
        REFERENCES direct_campaigns (id) ON DELETE CASCADE
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4
"#;

/// SQL for creating the direct_totals_monthly fact table.
pub const CREATE_DIRECT_TOTALS_MONTHLY_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS direct_totals_monthly (
    id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
    project_id BIGINT NOT NULL,
    year INT NOT NULL,
    month INT NOT NULL,
    impressions BIGINT NOT NULL DEFAULT 0,
    clicks BIGINT NOT NULL DEFAULT 0,
    ctr_pct DOUBLE NOT NULL DEFAULT 0,
    cpc DOUBLE NOT NULL DEFAULT 0,
    conversions BIGINT NULL,
    cpa DOUBLE NULL,
    cost DOUBLE NOT NULL DEFAULT 0,
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    UNIQUE KEY uq_direct_totals_monthly_nk (project_id, year, month),
    CONSTRAINT fk_direct_totals_monthly_project FOREIGN KEY (project_id)
        REFERENCES projects (id) ON DELETE CASCADE
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4
"#;

/// SQL for creating the seo_queries_monthly fact table.
pub const CREATE_SEO_QUERIES_MONTHLY_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS seo_queries_monthly (
    id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
    project_id BIGINT NOT NULL,
    year INT NOT NULL,
    month INT NOT NULL,
    query VARCHAR(255) NOT NULL,
    position INT NOT NULL DEFAULT 0,
    url VARCHAR(1024) NULL,
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    UNIQUE KEY uq_seo_queries_monthly_nk (project_id, year, month, query),
    CONSTRAINT fk_seo_queries_monthly_project FOREIGN KEY (project_id)
        REFERENCES projects (id) ON DELETE CASCADE
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4
"#;

/// SQL for creating the users table.
pub const CREATE_USERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
    email VARCHAR(255) NOT NULL,
    password_hash VARCHAR(255) NOT NULL,
    name VARCHAR(255) NOT NULL DEFAULT '',
    role VARCHAR(16) NOT NULL DEFAULT 'user',
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    last_login_at TIMESTAMP NULL,
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
    UNIQUE KEY uq_users_email (email)
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4
"#;

/// SQL for creating the user_project_roles table.
pub const CREATE_USER_PROJECT_ROLES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS user_project_roles (
    user_id BIGINT NOT NULL,
    project_id BIGINT NOT NULL,
    role VARCHAR(16) NOT NULL DEFAULT 'viewer',
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY (user_id, project_id),
    CONSTRAINT fk_upr_user FOREIGN KEY (user_id)
        REFERENCES users (id) ON DELETE CASCADE,
    CONSTRAINT fk_upr_project FOREIGN KEY (project_id)
        REFERENCES projects (id) ON DELETE CASCADE
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4
"#;

/// All table creation statements, parents first.
pub fn all_tables() -> Vec<&'static str> {
    vec![
        CREATE_PROJECTS_TABLE,
        CREATE_COUNTERS_TABLE,
        CREATE_GOALS_TABLE,
        CREATE_DIRECT_ACCOUNTS_TABLE,
        CREATE_DIRECT_CAMPAIGNS_TABLE,
        CREATE_METRICS_MONTHLY_TABLE,
        CREATE_METRICS_AGE_MONTHLY_TABLE,
        CREATE_DIRECT_CAMPAIGN_MONTHLY_TABLE,
        CREATE_DIRECT_TOTALS_MONTHLY_TABLE,
        CREATE_SEO_QUERIES_MONTHLY_TABLE,
        CREATE_USERS_TABLE,
        CREATE_USER_PROJECT_ROLES_TABLE,
    ]
}

use crate::client::Storage;
use bi_core::Result;

/// Initialize the database schema.
///
/// Creates all tables if they don't exist.
pub async fn init_schema(storage: &Storage) -> Result<()> {
    for sql in all_tables() {
        sqlx::query(sql)
            .execute(storage.pool())
            .await
            .map_err(|e| bi_core::Error::storage(format!("schema init error: {e}")))?;
    }
    Ok(())
}
