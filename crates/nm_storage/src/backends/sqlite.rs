use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePool, Row};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use nm_core::{
    parse_keywords, Agent, AgentSpec, AnalysisMethod, AnalysisRecord, Article, Error,
    InsertOutcome, NewAnalysis, NewArticle, Result, Storage, SuggestedAction,
};

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS agents (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        keywords TEXT NOT NULL,
        news_source TEXT,
        check_interval_secs INTEGER NOT NULL,
        is_active INTEGER NOT NULL,
        llm_enabled INTEGER NOT NULL,
        min_confidence REAL NOT NULL,
        last_checked TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS articles (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        agent_id INTEGER NOT NULL REFERENCES agents(id),
        url TEXT NOT NULL UNIQUE,
        title TEXT NOT NULL,
        description TEXT,
        content TEXT,
        source TEXT,
        author TEXT,
        published_at TEXT,
        keywords_matched TEXT NOT NULL,
        relevance_score INTEGER NOT NULL,
        analysis_method TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS analyses (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        agent_id INTEGER NOT NULL REFERENCES agents(id),
        article_url TEXT NOT NULL,
        summary TEXT NOT NULL,
        sentiment TEXT,
        confidence REAL NOT NULL,
        key_points TEXT NOT NULL,
        suggested_action TEXT NOT NULL,
        model_used TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    // Add future migrations here
];

pub struct SqliteStorage {
    pool: Arc<SqlitePool>,
    db_path: PathBuf,
}

impl SqliteStorage {
    pub async fn new_with_path(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let pool = SqlitePool::connect(&format!("sqlite:{}?mode=rwc", db_path.display()))
            .await
            .map_err(|e| Error::Storage(format!("failed to connect to database: {}", e)))?;

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(|e| Error::Storage(format!("failed to run migration {}: {}", i, e)))?;
        }

        Ok(Self {
            pool: Arc::new(pool),
            db_path: db_path.to_path_buf(),
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

fn parse_timestamp(value: String) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Storage(format!("failed to parse timestamp: {}", e)))
}

fn parse_optional_timestamp(value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    value.map(parse_timestamp).transpose()
}

fn method_from_str(value: &str) -> AnalysisMethod {
    match value {
        "ai" => AnalysisMethod::Ai,
        _ => AnalysisMethod::Fallback,
    }
}

fn row_to_agent(row: &sqlx::sqlite::SqliteRow) -> Result<Agent> {
    let keywords: String = row.get("keywords");
    Ok(Agent {
        id: row.get("id"),
        name: row.get("name"),
        keywords: serde_json::from_str(&keywords)?,
        news_source: row.get("news_source"),
        check_interval_secs: row.get::<i64, _>("check_interval_secs") as u64,
        is_active: row.get("is_active"),
        llm_enabled: row.get("llm_enabled"),
        min_confidence: row.get("min_confidence"),
        last_checked: parse_optional_timestamp(row.get("last_checked"))?,
        created_at: parse_timestamp(row.get("created_at"))?,
        updated_at: parse_timestamp(row.get("updated_at"))?,
    })
}

fn row_to_article(row: &sqlx::sqlite::SqliteRow) -> Result<Article> {
    let keywords: String = row.get("keywords_matched");
    let method: String = row.get("analysis_method");
    Ok(Article {
        id: row.get("id"),
        agent_id: row.get("agent_id"),
        url: row.get("url"),
        title: row.get("title"),
        description: row.get("description"),
        content: row.get("content"),
        source: row.get("source"),
        author: row.get("author"),
        published_at: parse_optional_timestamp(row.get("published_at"))?,
        keywords_matched: serde_json::from_str(&keywords)?,
        relevance_score: row.get("relevance_score"),
        analysis_method: method_from_str(&method),
        created_at: parse_timestamp(row.get("created_at"))?,
    })
}

fn row_to_analysis(row: &sqlx::sqlite::SqliteRow) -> Result<AnalysisRecord> {
    let key_points: String = row.get("key_points");
    let action: String = row.get("suggested_action");
    Ok(AnalysisRecord {
        id: row.get("id"),
        agent_id: row.get("agent_id"),
        article_url: row.get("article_url"),
        summary: row.get("summary"),
        sentiment: row.get("sentiment"),
        confidence: row.get("confidence"),
        key_points: serde_json::from_str(&key_points)?,
        suggested_action: SuggestedAction::parse_or_ignore(&action),
        model_used: row.get("model_used"),
        created_at: parse_timestamp(row.get("created_at"))?,
    })
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn create_agent(&self, spec: AgentSpec) -> Result<Agent> {
        spec.validate()?;
        let keywords = parse_keywords(&spec.keywords);
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO agents
            (name, keywords, news_source, check_interval_secs, is_active,
             llm_enabled, min_confidence, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&spec.name)
        .bind(serde_json::to_string(&keywords)?)
        .bind(&spec.news_source)
        .bind(spec.check_interval_secs as i64)
        .bind(spec.is_active)
        .bind(spec.llm_enabled)
        .bind(spec.min_confidence)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&*self.pool)
        .await
        .map_err(|e| Error::Storage(format!("failed to create agent: {}", e)))?;

        Ok(Agent {
            id: result.last_insert_rowid(),
            name: spec.name,
            keywords,
            news_source: spec.news_source,
            check_interval_secs: spec.check_interval_secs,
            is_active: spec.is_active,
            llm_enabled: spec.llm_enabled,
            min_confidence: spec.min_confidence,
            last_checked: None,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_agent(&self, id: i64) -> Result<Option<Agent>> {
        let row = sqlx::query("SELECT * FROM agents WHERE id = ?")
            .bind(id)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| Error::Storage(format!("failed to get agent: {}", e)))?;

        row.as_ref().map(row_to_agent).transpose()
    }

    async fn update_agent(&self, agent: &Agent) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE agents
            SET name = ?, keywords = ?, news_source = ?, check_interval_secs = ?,
                is_active = ?, llm_enabled = ?, min_confidence = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&agent.name)
        .bind(serde_json::to_string(&agent.keywords)?)
        .bind(&agent.news_source)
        .bind(agent.check_interval_secs as i64)
        .bind(agent.is_active)
        .bind(agent.llm_enabled)
        .bind(agent.min_confidence)
        .bind(Utc::now().to_rfc3339())
        .bind(agent.id)
        .execute(&*self.pool)
        .await
        .map_err(|e| Error::Storage(format!("failed to update agent: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("agent {}", agent.id)));
        }
        Ok(())
    }

    async fn touch_last_checked(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query("UPDATE agents SET last_checked = ? WHERE id = ?")
            .bind(at.to_rfc3339())
            .bind(id)
            .execute(&*self.pool)
            .await
            .map_err(|e| Error::Storage(format!("failed to touch agent: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("agent {}", id)));
        }
        Ok(())
    }

    async fn insert_article(&self, article: NewArticle) -> Result<InsertOutcome> {
        // The unique index on url is the authoritative dedup guard; a
        // conflicting insert from a concurrent loop lands in the DO NOTHING
        // branch and reports Duplicate.
        let result = sqlx::query(
            r#"
            INSERT INTO articles
            (agent_id, url, title, description, content, source, author,
             published_at, keywords_matched, relevance_score, analysis_method, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(url) DO NOTHING
            "#,
        )
        .bind(article.agent_id)
        .bind(&article.url)
        .bind(&article.title)
        .bind(&article.description)
        .bind(&article.content)
        .bind(&article.source)
        .bind(&article.author)
        .bind(article.published_at.map(|dt| dt.to_rfc3339()))
        .bind(serde_json::to_string(&article.keywords_matched)?)
        .bind(article.relevance_score)
        .bind(article.analysis_method.as_str())
        .bind(Utc::now().to_rfc3339())
        .execute(&*self.pool)
        .await
        .map_err(|e| Error::Storage(format!("failed to insert article: {}", e)))?;

        if result.rows_affected() == 0 {
            return Ok(InsertOutcome::Duplicate);
        }

        let row = sqlx::query("SELECT * FROM articles WHERE id = ?")
            .bind(result.last_insert_rowid())
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| Error::Storage(format!("failed to read back article: {}", e)))?;

        Ok(InsertOutcome::Inserted(row_to_article(&row)?))
    }

    async fn article_by_url(&self, url: &str) -> Result<Option<Article>> {
        let row = sqlx::query("SELECT * FROM articles WHERE url = ?")
            .bind(url)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| Error::Storage(format!("failed to get article: {}", e)))?;

        row.as_ref().map(row_to_article).transpose()
    }

    async fn article_count_since(&self, agent_id: i64, since: DateTime<Utc>) -> Result<u64> {
        let row =
            sqlx::query("SELECT COUNT(*) AS n FROM articles WHERE agent_id = ? AND created_at >= ?")
                .bind(agent_id)
                .bind(since.to_rfc3339())
                .fetch_one(&*self.pool)
                .await
                .map_err(|e| Error::Storage(format!("failed to count articles: {}", e)))?;

        Ok(row.get::<i64, _>("n") as u64)
    }

    async fn bump_article_relevance(&self, article_id: i64, by: i32) -> Result<i32> {
        let result =
            sqlx::query("UPDATE articles SET relevance_score = MIN(relevance_score + ?, 100) WHERE id = ?")
                .bind(by)
                .bind(article_id)
                .execute(&*self.pool)
                .await
                .map_err(|e| Error::Storage(format!("failed to bump relevance: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("article {}", article_id)));
        }

        let row = sqlx::query("SELECT relevance_score FROM articles WHERE id = ?")
            .bind(article_id)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| Error::Storage(format!("failed to read back relevance: {}", e)))?;

        Ok(row.get("relevance_score"))
    }

    async fn insert_analysis(&self, analysis: NewAnalysis) -> Result<AnalysisRecord> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO analyses
            (agent_id, article_url, summary, sentiment, confidence,
             key_points, suggested_action, model_used, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(analysis.agent_id)
        .bind(&analysis.article_url)
        .bind(&analysis.summary)
        .bind(&analysis.sentiment)
        .bind(analysis.confidence)
        .bind(serde_json::to_string(&analysis.key_points)?)
        .bind(analysis.suggested_action.as_str())
        .bind(&analysis.model_used)
        .bind(now.to_rfc3339())
        .execute(&*self.pool)
        .await
        .map_err(|e| Error::Storage(format!("failed to insert analysis: {}", e)))?;

        Ok(AnalysisRecord {
            id: result.last_insert_rowid(),
            agent_id: analysis.agent_id,
            article_url: analysis.article_url,
            summary: analysis.summary,
            sentiment: analysis.sentiment,
            confidence: analysis.confidence,
            key_points: analysis.key_points,
            suggested_action: analysis.suggested_action,
            model_used: analysis.model_used,
            created_at: now,
        })
    }

    async fn latest_analysis(&self, agent_id: i64) -> Result<Option<AnalysisRecord>> {
        let row = sqlx::query("SELECT * FROM analyses WHERE agent_id = ? ORDER BY id DESC LIMIT 1")
            .bind(agent_id)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| Error::Storage(format!("failed to get latest analysis: {}", e)))?;

        row.as_ref().map(row_to_analysis).transpose()
    }
}
