//! Neo4j client for the entity store

use super::models::*;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use neo4rs::{query, Graph, Query};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Client for entity persistence on Neo4j
pub struct Neo4jClient {
    graph: Arc<Graph>,
}

/// Serialize a unit enum to its snake_case wire string
fn enum_to_str<T: Serialize>(value: &T) -> Result<String> {
    match serde_json::to_value(value)? {
        serde_json::Value::String(s) => Ok(s),
        other => anyhow::bail!("expected string-like enum, got {other}"),
    }
}

/// Parse a unit enum from its snake_case wire string
fn enum_from_str<T: DeserializeOwned>(s: &str) -> Result<T> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
        .with_context(|| format!("unrecognized enum value '{s}'"))
}

fn uuids_to_strings(ids: &[Uuid]) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

fn strings_to_uuids(values: Vec<String>) -> Vec<Uuid> {
    values.into_iter().filter_map(|s| s.parse().ok()).collect()
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    s.parse().unwrap_or_else(|_| Utc::now())
}

impl Neo4jClient {
    /// Connect and initialize the schema
    pub async fn new(uri: &str, user: &str, password: &str) -> Result<Self> {
        let graph = Graph::new(uri, user, password)
            .await
            .context("Failed to connect to Neo4j")?;

        let client = Self {
            graph: Arc::new(graph),
        };

        client.init_schema().await?;

        Ok(client)
    }

    /// Initialize uniqueness constraints and indexes
    async fn init_schema(&self) -> Result<()> {
        let constraints = vec![
            "CREATE CONSTRAINT user_id IF NOT EXISTS FOR (u:User) REQUIRE u.id IS UNIQUE",
            "CREATE CONSTRAINT project_id IF NOT EXISTS FOR (p:Project) REQUIRE p.id IS UNIQUE",
            "CREATE CONSTRAINT module_id IF NOT EXISTS FOR (m:Module) REQUIRE m.id IS UNIQUE",
            "CREATE CONSTRAINT sprint_id IF NOT EXISTS FOR (s:Sprint) REQUIRE s.id IS UNIQUE",
            "CREATE CONSTRAINT task_id IF NOT EXISTS FOR (t:Task) REQUIRE t.id IS UNIQUE",
            "CREATE CONSTRAINT notification_id IF NOT EXISTS FOR (n:Notification) REQUIRE n.id IS UNIQUE",
        ];

        let indexes = vec![
            "CREATE INDEX user_role IF NOT EXISTS FOR (u:User) ON (u.role)",
            "CREATE INDEX module_project IF NOT EXISTS FOR (m:Module) ON (m.project_id)",
            "CREATE INDEX module_status IF NOT EXISTS FOR (m:Module) ON (m.status)",
            "CREATE INDEX sprint_module IF NOT EXISTS FOR (s:Sprint) ON (s.module_id)",
            "CREATE INDEX task_sprint IF NOT EXISTS FOR (t:Task) ON (t.sprint_id)",
            "CREATE INDEX task_status IF NOT EXISTS FOR (t:Task) ON (t.status)",
            "CREATE INDEX notification_recipient IF NOT EXISTS FOR (n:Notification) ON (n.recipient)",
            "CREATE INDEX notification_unread IF NOT EXISTS FOR (n:Notification) ON (n.is_read)",
        ];

        for constraint in constraints {
            if let Err(e) = self.graph.run(query(constraint)).await {
                tracing::warn!("Constraint may already exist: {}", e);
            }
        }

        for index in indexes {
            if let Err(e) = self.graph.run(query(index)).await {
                tracing::warn!("Index may already exist: {}", e);
            }
        }

        Ok(())
    }

    async fn fetch_rows(&self, q: Query) -> Result<Vec<neo4rs::Row>> {
        let mut result = self.graph.execute(q).await?;
        let mut rows = Vec::new();
        while let Some(row) = result.next().await? {
            rows.push(row);
        }
        Ok(rows)
    }

    // ========================================================================
    // User operations
    // ========================================================================

    /// Create a user
    pub async fn create_user(&self, user: &UserNode) -> Result<()> {
        let q = query(
            r#"
            CREATE (u:User {
                id: $id,
                name: $name,
                email: $email,
                role: $role,
                active: $active,
                created_at: $created_at
            })
            "#,
        )
        .param("id", user.id.to_string())
        .param("name", user.name.clone())
        .param("email", user.email.clone())
        .param("role", enum_to_str(&user.role)?)
        .param("active", user.active)
        .param("created_at", user.created_at.to_rfc3339());

        self.graph.run(q).await?;
        Ok(())
    }

    /// Get a user by ID
    pub async fn get_user(&self, id: Uuid) -> Result<Option<UserNode>> {
        let q = query("MATCH (u:User {id: $id}) RETURN u").param("id", id.to_string());

        let rows = self.fetch_rows(q).await?;
        match rows.first() {
            Some(row) => {
                let node: neo4rs::Node = row.get("u")?;
                Ok(Some(self.node_to_user(&node)?))
            }
            None => Ok(None),
        }
    }

    /// All active users whose role is in the given set
    pub async fn list_active_users_by_roles(&self, roles: &[Role]) -> Result<Vec<UserNode>> {
        let role_strings: Vec<String> = roles
            .iter()
            .map(enum_to_str)
            .collect::<Result<Vec<_>>>()?;

        let q = query(
            r#"
            MATCH (u:User)
            WHERE u.role IN $roles AND u.active = true
            RETURN u
            ORDER BY u.name
            "#,
        )
        .param("roles", role_strings);

        let rows = self.fetch_rows(q).await?;
        rows.iter()
            .map(|row| {
                let node: neo4rs::Node = row.get("u")?;
                self.node_to_user(&node)
            })
            .collect()
    }

    fn node_to_user(&self, node: &neo4rs::Node) -> Result<UserNode> {
        Ok(UserNode {
            id: node.get::<String>("id")?.parse()?,
            name: node.get("name")?,
            email: node.get("email")?,
            role: enum_from_str(&node.get::<String>("role")?)?,
            active: node.get("active")?,
            created_at: parse_datetime(&node.get::<String>("created_at")?),
        })
    }

    // ========================================================================
    // Project operations
    // ========================================================================

    /// Create a project
    pub async fn create_project(&self, project: &ProjectNode) -> Result<()> {
        let q = query(
            r#"
            CREATE (p:Project {
                id: $id,
                name: $name,
                description: $description,
                status: $status,
                total_tasks: $total_tasks,
                completed_tasks: $completed_tasks,
                total_story_points: $total_story_points,
                completed_story_points: $completed_story_points,
                defect_density: $defect_density,
                budget_total: $budget_total,
                budget_spent: $budget_spent,
                start_date: $start_date,
                end_date: $end_date,
                created_at: $created_at,
                updated_at: $updated_at
            })
            "#,
        )
        .param("id", project.id.to_string())
        .param("name", project.name.clone())
        .param("description", project.description.clone().unwrap_or_default())
        .param("status", enum_to_str(&project.status)?)
        .param("total_tasks", project.counters.total_tasks as i64)
        .param("completed_tasks", project.counters.completed_tasks as i64)
        .param("total_story_points", project.counters.total_story_points as i64)
        .param(
            "completed_story_points",
            project.counters.completed_story_points as i64,
        )
        .param("defect_density", project.counters.defect_density)
        .param("budget_total", project.budget_total.unwrap_or(-1.0))
        .param("budget_spent", project.budget_spent)
        .param(
            "start_date",
            project.start_date.map(|d| d.to_rfc3339()).unwrap_or_default(),
        )
        .param(
            "end_date",
            project.end_date.map(|d| d.to_rfc3339()).unwrap_or_default(),
        )
        .param("created_at", project.created_at.to_rfc3339())
        .param("updated_at", project.updated_at.to_rfc3339());

        self.graph.run(q).await?;
        Ok(())
    }

    /// Get a project by ID
    pub async fn get_project(&self, id: Uuid) -> Result<Option<ProjectNode>> {
        let q = query("MATCH (p:Project {id: $id}) RETURN p").param("id", id.to_string());

        let rows = self.fetch_rows(q).await?;
        match rows.first() {
            Some(row) => {
                let node: neo4rs::Node = row.get("p")?;
                Ok(Some(self.node_to_project(&node)?))
            }
            None => Ok(None),
        }
    }

    /// Update a project's derived status
    pub async fn update_project_status(&self, id: Uuid, status: ProjectStatus) -> Result<()> {
        let q = query(
            r#"
            MATCH (p:Project {id: $id})
            SET p.status = $status, p.updated_at = $updated_at
            "#,
        )
        .param("id", id.to_string())
        .param("status", enum_to_str(&status)?)
        .param("updated_at", Utc::now().to_rfc3339());

        self.graph.run(q).await?;
        Ok(())
    }

    /// Update a project's rollup counters
    pub async fn update_project_rollup(&self, id: Uuid, counters: &RollupCounters) -> Result<()> {
        let q = query(
            r#"
            MATCH (p:Project {id: $id})
            SET p.total_tasks = $total_tasks,
                p.completed_tasks = $completed_tasks,
                p.total_story_points = $total_story_points,
                p.completed_story_points = $completed_story_points,
                p.defect_density = $defect_density,
                p.updated_at = $updated_at
            "#,
        )
        .param("id", id.to_string())
        .param("total_tasks", counters.total_tasks as i64)
        .param("completed_tasks", counters.completed_tasks as i64)
        .param("total_story_points", counters.total_story_points as i64)
        .param("completed_story_points", counters.completed_story_points as i64)
        .param("defect_density", counters.defect_density)
        .param("updated_at", Utc::now().to_rfc3339());

        self.graph.run(q).await?;
        Ok(())
    }

    /// Projects not yet completed
    pub async fn list_open_projects(&self) -> Result<Vec<ProjectNode>> {
        let q = query(
            r#"
            MATCH (p:Project)
            WHERE p.status <> 'completed'
            RETURN p
            "#,
        );

        let rows = self.fetch_rows(q).await?;
        rows.iter()
            .map(|row| {
                let node: neo4rs::Node = row.get("p")?;
                self.node_to_project(&node)
            })
            .collect()
    }

    fn node_to_project(&self, node: &neo4rs::Node) -> Result<ProjectNode> {
        let budget_total: f64 = node.get("budget_total")?;
        Ok(ProjectNode {
            id: node.get::<String>("id")?.parse()?,
            name: node.get("name")?,
            description: node.get::<String>("description").ok().filter(|s| !s.is_empty()),
            status: enum_from_str(&node.get::<String>("status")?)?,
            counters: self.node_to_counters(node)?,
            budget_total: (budget_total >= 0.0).then_some(budget_total),
            budget_spent: node.get("budget_spent")?,
            start_date: node
                .get::<String>("start_date")
                .ok()
                .and_then(|s| s.parse().ok()),
            end_date: node
                .get::<String>("end_date")
                .ok()
                .and_then(|s| s.parse().ok()),
            created_at: parse_datetime(&node.get::<String>("created_at")?),
            updated_at: parse_datetime(&node.get::<String>("updated_at")?),
        })
    }

    fn node_to_counters(&self, node: &neo4rs::Node) -> Result<RollupCounters> {
        Ok(RollupCounters {
            total_tasks: node.get::<i64>("total_tasks")? as u32,
            completed_tasks: node.get::<i64>("completed_tasks")? as u32,
            total_story_points: node.get::<i64>("total_story_points")? as u32,
            completed_story_points: node.get::<i64>("completed_story_points")? as u32,
            defect_density: node.get("defect_density")?,
        })
    }

    // ========================================================================
    // Module operations
    // ========================================================================

    /// Create a module
    pub async fn create_module(&self, module: &ModuleNode) -> Result<()> {
        let q = query(
            r#"
            CREATE (m:Module {
                id: $id,
                project_id: $project_id,
                name: $name,
                description: $description,
                status: $status,
                progress: $progress,
                total_tasks: $total_tasks,
                completed_tasks: $completed_tasks,
                total_story_points: $total_story_points,
                completed_story_points: $completed_story_points,
                defect_density: $defect_density,
                start_date: $start_date,
                end_date: $end_date,
                created_at: $created_at,
                updated_at: $updated_at,
                history: $history
            })
            "#,
        )
        .param("id", module.id.to_string())
        .param("project_id", module.project_id.to_string())
        .param("name", module.name.clone())
        .param("description", module.description.clone().unwrap_or_default())
        .param("status", enum_to_str(&module.status)?)
        .param("progress", module.progress as i64)
        .param("total_tasks", module.counters.total_tasks as i64)
        .param("completed_tasks", module.counters.completed_tasks as i64)
        .param("total_story_points", module.counters.total_story_points as i64)
        .param(
            "completed_story_points",
            module.counters.completed_story_points as i64,
        )
        .param("defect_density", module.counters.defect_density)
        .param(
            "start_date",
            module.start_date.map(|d| d.to_rfc3339()).unwrap_or_default(),
        )
        .param(
            "end_date",
            module.end_date.map(|d| d.to_rfc3339()).unwrap_or_default(),
        )
        .param("created_at", module.created_at.to_rfc3339())
        .param("updated_at", module.updated_at.to_rfc3339())
        .param("history", serde_json::to_string(&module.history)?);

        self.graph.run(q).await?;
        Ok(())
    }

    /// Get a module by ID
    pub async fn get_module(&self, id: Uuid) -> Result<Option<ModuleNode>> {
        let q = query("MATCH (m:Module {id: $id}) RETURN m").param("id", id.to_string());

        let rows = self.fetch_rows(q).await?;
        match rows.first() {
            Some(row) => {
                let node: neo4rs::Node = row.get("m")?;
                Ok(Some(self.node_to_module(&node)?))
            }
            None => Ok(None),
        }
    }

    /// List all modules of a project
    pub async fn list_project_modules(&self, project_id: Uuid) -> Result<Vec<ModuleNode>> {
        let q = query(
            r#"
            MATCH (m:Module {project_id: $project_id})
            RETURN m
            ORDER BY m.created_at
            "#,
        )
        .param("project_id", project_id.to_string());

        let rows = self.fetch_rows(q).await?;
        rows.iter()
            .map(|row| {
                let node: neo4rs::Node = row.get("m")?;
                self.node_to_module(&node)
            })
            .collect()
    }

    /// Update a module's status and append a history entry
    pub async fn update_module_status(
        &self,
        id: Uuid,
        status: ModuleStatus,
        entry: &HistoryEntry,
    ) -> Result<()> {
        let module = self
            .get_module(id)
            .await?
            .with_context(|| format!("module {id} not found"))?;

        let mut history = module.history;
        history.push(entry.clone());

        let q = query(
            r#"
            MATCH (m:Module {id: $id})
            SET m.status = $status, m.updated_at = $updated_at, m.history = $history
            "#,
        )
        .param("id", id.to_string())
        .param("status", enum_to_str(&status)?)
        .param("updated_at", Utc::now().to_rfc3339())
        .param("history", serde_json::to_string(&history)?);

        self.graph.run(q).await?;
        Ok(())
    }

    /// Update a module's derived progress/counters
    pub async fn update_module_rollup(
        &self,
        id: Uuid,
        progress: u32,
        counters: &RollupCounters,
    ) -> Result<()> {
        let q = query(
            r#"
            MATCH (m:Module {id: $id})
            SET m.progress = $progress,
                m.total_tasks = $total_tasks,
                m.completed_tasks = $completed_tasks,
                m.total_story_points = $total_story_points,
                m.completed_story_points = $completed_story_points,
                m.defect_density = $defect_density,
                m.updated_at = $updated_at
            "#,
        )
        .param("id", id.to_string())
        .param("progress", progress as i64)
        .param("total_tasks", counters.total_tasks as i64)
        .param("completed_tasks", counters.completed_tasks as i64)
        .param("total_story_points", counters.total_story_points as i64)
        .param("completed_story_points", counters.completed_story_points as i64)
        .param("defect_density", counters.defect_density)
        .param("updated_at", Utc::now().to_rfc3339());

        self.graph.run(q).await?;
        Ok(())
    }

    /// Modules not yet in a terminal status
    pub async fn list_open_modules(&self) -> Result<Vec<ModuleNode>> {
        let q = query(
            r#"
            MATCH (m:Module)
            WHERE NOT m.status IN ['released', 'maintained', 'archived']
            RETURN m
            "#,
        );

        let rows = self.fetch_rows(q).await?;
        rows.iter()
            .map(|row| {
                let node: neo4rs::Node = row.get("m")?;
                self.node_to_module(&node)
            })
            .collect()
    }

    fn node_to_module(&self, node: &neo4rs::Node) -> Result<ModuleNode> {
        Ok(ModuleNode {
            id: node.get::<String>("id")?.parse()?,
            project_id: node.get::<String>("project_id")?.parse()?,
            name: node.get("name")?,
            description: node.get::<String>("description").ok().filter(|s| !s.is_empty()),
            status: enum_from_str(&node.get::<String>("status")?)?,
            progress: node.get::<i64>("progress")? as u32,
            counters: self.node_to_counters(node)?,
            start_date: node
                .get::<String>("start_date")
                .ok()
                .and_then(|s| s.parse().ok()),
            end_date: node
                .get::<String>("end_date")
                .ok()
                .and_then(|s| s.parse().ok()),
            created_at: parse_datetime(&node.get::<String>("created_at")?),
            updated_at: parse_datetime(&node.get::<String>("updated_at")?),
            history: node
                .get::<String>("history")
                .ok()
                .and_then(|s| serde_json::from_str(&s).ok())
                .unwrap_or_default(),
        })
    }

    // ========================================================================
    // Sprint operations
    // ========================================================================

    /// Create a sprint
    pub async fn create_sprint(&self, sprint: &SprintNode) -> Result<()> {
        let q = query(
            r#"
            CREATE (s:Sprint {
                id: $id,
                module_id: $module_id,
                name: $name,
                status: $status,
                members: $members,
                start_date: $start_date,
                end_date: $end_date,
                created_at: $created_at
            })
            "#,
        )
        .param("id", sprint.id.to_string())
        .param(
            "module_id",
            sprint.module_id.map(|m| m.to_string()).unwrap_or_default(),
        )
        .param("name", sprint.name.clone())
        .param("status", enum_to_str(&sprint.status)?)
        .param("members", uuids_to_strings(&sprint.members))
        .param(
            "start_date",
            sprint.start_date.map(|d| d.to_rfc3339()).unwrap_or_default(),
        )
        .param(
            "end_date",
            sprint.end_date.map(|d| d.to_rfc3339()).unwrap_or_default(),
        )
        .param("created_at", sprint.created_at.to_rfc3339());

        self.graph.run(q).await?;
        Ok(())
    }

    /// Get a sprint by ID
    pub async fn get_sprint(&self, id: Uuid) -> Result<Option<SprintNode>> {
        let q = query("MATCH (s:Sprint {id: $id}) RETURN s").param("id", id.to_string());

        let rows = self.fetch_rows(q).await?;
        match rows.first() {
            Some(row) => {
                let node: neo4rs::Node = row.get("s")?;
                Ok(Some(self.node_to_sprint(&node)?))
            }
            None => Ok(None),
        }
    }

    /// List all sprints attached to a module
    pub async fn list_module_sprints(&self, module_id: Uuid) -> Result<Vec<SprintNode>> {
        let q = query(
            r#"
            MATCH (s:Sprint {module_id: $module_id})
            RETURN s
            ORDER BY s.created_at
            "#,
        )
        .param("module_id", module_id.to_string());

        let rows = self.fetch_rows(q).await?;
        rows.iter()
            .map(|row| {
                let node: neo4rs::Node = row.get("s")?;
                self.node_to_sprint(&node)
            })
            .collect()
    }

    /// Update a sprint's derived status
    pub async fn update_sprint_status(&self, id: Uuid, status: SprintStatus) -> Result<()> {
        let q = query(
            r#"
            MATCH (s:Sprint {id: $id})
            SET s.status = $status
            "#,
        )
        .param("id", id.to_string())
        .param("status", enum_to_str(&status)?);

        self.graph.run(q).await?;
        Ok(())
    }

    /// Sprints not yet done
    pub async fn list_open_sprints(&self) -> Result<Vec<SprintNode>> {
        let q = query(
            r#"
            MATCH (s:Sprint)
            WHERE s.status <> 'done'
            RETURN s
            "#,
        );

        let rows = self.fetch_rows(q).await?;
        rows.iter()
            .map(|row| {
                let node: neo4rs::Node = row.get("s")?;
                self.node_to_sprint(&node)
            })
            .collect()
    }

    fn node_to_sprint(&self, node: &neo4rs::Node) -> Result<SprintNode> {
        let module_id: String = node.get("module_id")?;
        Ok(SprintNode {
            id: node.get::<String>("id")?.parse()?,
            module_id: (!module_id.is_empty())
                .then(|| module_id.parse())
                .transpose()?,
            name: node.get("name")?,
            status: enum_from_str(&node.get::<String>("status")?)?,
            members: strings_to_uuids(node.get("members")?),
            start_date: node
                .get::<String>("start_date")
                .ok()
                .and_then(|s| s.parse().ok()),
            end_date: node
                .get::<String>("end_date")
                .ok()
                .and_then(|s| s.parse().ok()),
            created_at: parse_datetime(&node.get::<String>("created_at")?),
        })
    }

    // ========================================================================
    // Task operations
    // ========================================================================

    /// Create a task
    pub async fn create_task(&self, task: &TaskNode) -> Result<()> {
        let q = query(
            r#"
            CREATE (t:Task {
                id: $id,
                sprint_id: $sprint_id,
                title: $title,
                description: $description,
                status: $status,
                review_status: $review_status,
                assignees: $assignees,
                reviewers: $reviewers,
                story_points: $story_points,
                created_at: $created_at,
                updated_at: $updated_at,
                history: $history
            })
            "#,
        )
        .param("id", task.id.to_string())
        .param("sprint_id", task.sprint_id.to_string())
        .param("title", task.title.clone())
        .param("description", task.description.clone().unwrap_or_default())
        .param("status", enum_to_str(&task.status)?)
        .param("review_status", enum_to_str(&task.review_status)?)
        .param("assignees", uuids_to_strings(&task.assignees))
        .param("reviewers", uuids_to_strings(&task.reviewers))
        .param("story_points", task.story_points as i64)
        .param("created_at", task.created_at.to_rfc3339())
        .param("updated_at", task.updated_at.to_rfc3339())
        .param("history", serde_json::to_string(&task.history)?);

        self.graph.run(q).await?;
        Ok(())
    }

    /// Get a task by ID
    pub async fn get_task(&self, id: Uuid) -> Result<Option<TaskNode>> {
        let q = query("MATCH (t:Task {id: $id}) RETURN t").param("id", id.to_string());

        let rows = self.fetch_rows(q).await?;
        match rows.first() {
            Some(row) => {
                let node: neo4rs::Node = row.get("t")?;
                Ok(Some(self.node_to_task(&node)?))
            }
            None => Ok(None),
        }
    }

    /// Persist a full task
    pub async fn save_task(&self, task: &TaskNode) -> Result<()> {
        let q = query(
            r#"
            MATCH (t:Task {id: $id})
            SET t.title = $title,
                t.description = $description,
                t.status = $status,
                t.review_status = $review_status,
                t.assignees = $assignees,
                t.reviewers = $reviewers,
                t.story_points = $story_points,
                t.updated_at = $updated_at,
                t.history = $history
            "#,
        )
        .param("id", task.id.to_string())
        .param("title", task.title.clone())
        .param("description", task.description.clone().unwrap_or_default())
        .param("status", enum_to_str(&task.status)?)
        .param("review_status", enum_to_str(&task.review_status)?)
        .param("assignees", uuids_to_strings(&task.assignees))
        .param("reviewers", uuids_to_strings(&task.reviewers))
        .param("story_points", task.story_points as i64)
        .param("updated_at", task.updated_at.to_rfc3339())
        .param("history", serde_json::to_string(&task.history)?);

        self.graph.run(q).await?;
        Ok(())
    }

    /// List all tasks of a sprint
    pub async fn list_sprint_tasks(&self, sprint_id: Uuid) -> Result<Vec<TaskNode>> {
        let q = query(
            r#"
            MATCH (t:Task {sprint_id: $sprint_id})
            RETURN t
            ORDER BY t.created_at
            "#,
        )
        .param("sprint_id", sprint_id.to_string());

        let rows = self.fetch_rows(q).await?;
        rows.iter()
            .map(|row| {
                let node: neo4rs::Node = row.get("t")?;
                self.node_to_task(&node)
            })
            .collect()
    }

    /// Tasks in any of the given statuses not touched since the cutoff.
    /// RFC 3339 UTC strings compare lexicographically in timestamp order.
    pub async fn list_stale_tasks(
        &self,
        statuses: &[TaskStatus],
        older_than: DateTime<Utc>,
    ) -> Result<Vec<TaskNode>> {
        let status_strings: Vec<String> = statuses
            .iter()
            .map(enum_to_str)
            .collect::<Result<Vec<_>>>()?;

        let q = query(
            r#"
            MATCH (t:Task)
            WHERE t.status IN $statuses AND t.updated_at < $cutoff
            RETURN t
            ORDER BY t.updated_at
            "#,
        )
        .param("statuses", status_strings)
        .param("cutoff", older_than.to_rfc3339());

        let rows = self.fetch_rows(q).await?;
        rows.iter()
            .map(|row| {
                let node: neo4rs::Node = row.get("t")?;
                self.node_to_task(&node)
            })
            .collect()
    }

    fn node_to_task(&self, node: &neo4rs::Node) -> Result<TaskNode> {
        Ok(TaskNode {
            id: node.get::<String>("id")?.parse()?,
            sprint_id: node.get::<String>("sprint_id")?.parse()?,
            title: node.get("title")?,
            description: node.get::<String>("description").ok().filter(|s| !s.is_empty()),
            status: enum_from_str(&node.get::<String>("status")?)?,
            review_status: enum_from_str(&node.get::<String>("review_status")?)?,
            assignees: strings_to_uuids(node.get("assignees")?),
            reviewers: strings_to_uuids(node.get("reviewers")?),
            story_points: node.get::<i64>("story_points")? as u32,
            created_at: parse_datetime(&node.get::<String>("created_at")?),
            updated_at: parse_datetime(&node.get::<String>("updated_at")?),
            history: node
                .get::<String>("history")
                .ok()
                .and_then(|s| serde_json::from_str(&s).ok())
                .unwrap_or_default(),
        })
    }

    // ========================================================================
    // Notification operations
    // ========================================================================

    /// Persist one notification row
    pub async fn insert_notification(&self, notification: &NotificationNode) -> Result<()> {
        let q = query(
            r#"
            CREATE (n:Notification {
                id: $id,
                recipient: $recipient,
                kind: $kind,
                ref_id: $ref_id,
                message: $message,
                is_read: $is_read,
                created_at: $created_at,
                delivered_at: $delivered_at,
                read_at: $read_at
            })
            "#,
        )
        .param("id", notification.id.to_string())
        .param("recipient", notification.recipient.to_string())
        .param("kind", notification.kind.clone())
        .param("ref_id", notification.ref_id.to_string())
        .param("message", notification.message.clone())
        .param("is_read", notification.is_read)
        .param("created_at", notification.created_at.to_rfc3339())
        .param(
            "delivered_at",
            notification
                .delivered_at
                .map(|d| d.to_rfc3339())
                .unwrap_or_default(),
        )
        .param(
            "read_at",
            notification
                .read_at
                .map(|d| d.to_rfc3339())
                .unwrap_or_default(),
        );

        self.graph.run(q).await?;
        Ok(())
    }

    /// Get a notification by ID
    pub async fn get_notification(&self, id: Uuid) -> Result<Option<NotificationNode>> {
        let q = query("MATCH (n:Notification {id: $id}) RETURN n").param("id", id.to_string());

        let rows = self.fetch_rows(q).await?;
        match rows.first() {
            Some(row) => {
                let node: neo4rs::Node = row.get("n")?;
                Ok(Some(self.node_to_notification(&node)?))
            }
            None => Ok(None),
        }
    }

    /// CAS claim on `delivered_at`. The WHERE guard and SET run in one
    /// auto-committed transaction, so exactly one concurrent caller matches.
    pub async fn claim_notification_delivered(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let q = query(
            r#"
            MATCH (n:Notification {id: $id})
            WHERE n.delivered_at = ''
            SET n.delivered_at = $at
            RETURN count(n) AS claimed
            "#,
        )
        .param("id", id.to_string())
        .param("at", at.to_rfc3339());

        let rows = self.fetch_rows(q).await?;
        let claimed: i64 = match rows.first() {
            Some(row) => row.get("claimed")?,
            None => 0,
        };
        Ok(claimed > 0)
    }

    /// Undelivered, unread notifications for a recipient, oldest first
    pub async fn list_pending_notifications(
        &self,
        recipient: Uuid,
    ) -> Result<Vec<NotificationNode>> {
        let q = query(
            r#"
            MATCH (n:Notification {recipient: $recipient})
            WHERE n.is_read = false AND n.delivered_at = ''
            RETURN n
            ORDER BY n.created_at
            "#,
        )
        .param("recipient", recipient.to_string());

        let rows = self.fetch_rows(q).await?;
        rows.iter()
            .map(|row| {
                let node: neo4rs::Node = row.get("n")?;
                self.node_to_notification(&node)
            })
            .collect()
    }

    /// Recent notifications for a recipient, newest first
    pub async fn list_notifications(
        &self,
        recipient: Uuid,
        limit: usize,
    ) -> Result<Vec<NotificationNode>> {
        let q = query(
            r#"
            MATCH (n:Notification {recipient: $recipient})
            RETURN n
            ORDER BY n.created_at DESC
            LIMIT $limit
            "#,
        )
        .param("recipient", recipient.to_string())
        .param("limit", limit as i64);

        let rows = self.fetch_rows(q).await?;
        rows.iter()
            .map(|row| {
                let node: neo4rs::Node = row.get("n")?;
                self.node_to_notification(&node)
            })
            .collect()
    }

    /// Mark as read exactly the rows among `ids` owned by `recipient`
    pub async fn mark_notifications_read(
        &self,
        recipient: Uuid,
        ids: &[Uuid],
        at: DateTime<Utc>,
    ) -> Result<usize> {
        let q = query(
            r#"
            MATCH (n:Notification)
            WHERE n.id IN $ids AND n.recipient = $recipient AND n.is_read = false
            SET n.is_read = true, n.read_at = $at
            RETURN count(n) AS updated
            "#,
        )
        .param("ids", uuids_to_strings(ids))
        .param("recipient", recipient.to_string())
        .param("at", at.to_rfc3339());

        let rows = self.fetch_rows(q).await?;
        let updated: i64 = match rows.first() {
            Some(row) => row.get("updated")?,
            None => 0,
        };
        Ok(updated as usize)
    }

    fn node_to_notification(&self, node: &neo4rs::Node) -> Result<NotificationNode> {
        Ok(NotificationNode {
            id: node.get::<String>("id")?.parse()?,
            recipient: node.get::<String>("recipient")?.parse()?,
            kind: node.get("kind")?,
            ref_id: node.get::<String>("ref_id")?.parse()?,
            message: node.get("message")?,
            is_read: node.get("is_read")?,
            created_at: parse_datetime(&node.get::<String>("created_at")?),
            delivered_at: node
                .get::<String>("delivered_at")
                .ok()
                .and_then(|s| s.parse().ok()),
            read_at: node
                .get::<String>("read_at")
                .ok()
                .and_then(|s| s.parse().ok()),
        })
    }
}
