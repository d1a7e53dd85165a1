use super::Db;
use super::users::{User, UserRepository};
use crate::error::DbError;
use core_types::patch::apply;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Class {
    pub id: i64,
    pub name: String,
    pub teacher_id: i64,
    pub archived: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewClass {
    pub name: String,
    pub teacher_id: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClassPatch {
    pub name: Option<String>,
    pub teacher_id: Option<i64>,
    pub archived: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct ClassRepository {
    db: Db,
    users: UserRepository,
}

impl ClassRepository {
    pub fn new(db: Db, users: UserRepository) -> Self {
        Self { db, users }
    }

    async fn ensure_teacher(&self, teacher_id: i64) -> Result<(), DbError> {
        let teacher = self.users.get(teacher_id).await?;
        if !teacher.role.can_teach() {
            return Err(DbError::NotATeacher);
        }
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<Class>, DbError> {
        self.db
            .run(async {
                let classes = sqlx::query_as::<_, Class>(
                    "SELECT id, name, teacher_id, archived FROM classes ORDER BY archived, name",
                )
                .fetch_all(self.db.pool())
                .await?;
                Ok(classes)
            })
            .await
    }

    pub async fn get(&self, id: i64) -> Result<Class, DbError> {
        self.db
            .run(async {
                sqlx::query_as::<_, Class>(
                    "SELECT id, name, teacher_id, archived FROM classes WHERE id = $1",
                )
                .bind(id)
                .fetch_optional(self.db.pool())
                .await?
                .ok_or(DbError::NoSuchClass)
            })
            .await
    }

    pub async fn insert(&self, new: &NewClass) -> Result<Class, DbError> {
        self.ensure_teacher(new.teacher_id).await?;
        self.db
            .run(async {
                let class = sqlx::query_as::<_, Class>(
                    "INSERT INTO classes (name, teacher_id) VALUES ($1, $2) RETURNING id, name, teacher_id, archived",
                )
                .bind(&new.name)
                .bind(new.teacher_id)
                .fetch_one(self.db.pool())
                .await?;
                Ok(class)
            })
            .await
    }

    pub async fn update(&self, id: i64, patch: ClassPatch) -> Result<Class, DbError> {
        let mut class = self.get(id).await?;
        if let Some(teacher_id) = patch.teacher_id {
            self.ensure_teacher(teacher_id).await?;
            class.teacher_id = teacher_id;
        }
        apply(&mut class.name, patch.name);
        apply(&mut class.archived, patch.archived);

        self.db
            .run(async {
                sqlx::query_as::<_, Class>(
                    r#"
                    UPDATE classes SET name = $2, teacher_id = $3, archived = $4
                    WHERE id = $1
                    RETURNING id, name, teacher_id, archived
                    "#,
                )
                .bind(id)
                .bind(&class.name)
                .bind(class.teacher_id)
                .bind(class.archived)
                .fetch_optional(self.db.pool())
                .await?
                .ok_or(DbError::NoSuchClass)
            })
            .await
    }

    /// The class a student is assigned to.
    pub async fn get_user_class(&self, user_id: i64) -> Result<Class, DbError> {
        let user = self.users.get(user_id).await?;
        let class_id = user.class_id.ok_or(DbError::NoSuchClass)?;
        self.get(class_id).await
    }

    pub async fn set_user_class(&self, user_id: i64, class_id: i64) -> Result<Class, DbError> {
        self.users.get_student(user_id).await?;
        let class = self.get(class_id).await?;
        self.db
            .run(async {
                sqlx::query("UPDATE users SET class_id = $2 WHERE id = $1")
                    .bind(user_id)
                    .bind(class_id)
                    .execute(self.db.pool())
                    .await?;
                Ok(())
            })
            .await?;
        Ok(class)
    }

    pub async fn list_users(&self, class_id: i64) -> Result<Vec<User>, DbError> {
        self.get(class_id).await?;
        self.db
            .run(async {
                let users = sqlx::query_as::<_, User>(
                    r#"
                    SELECT id, name, email, password_hash, role, phone, address, birth_date,
                           class_id, active, created_at, version
                    FROM users WHERE class_id = $1 ORDER BY name
                    "#,
                )
                .bind(class_id)
                .fetch_all(self.db.pool())
                .await?;
                Ok(users)
            })
            .await
    }
}
