use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, JoinType, QueryFilter, QuerySelect,
    RelationTrait, Set, sea_query::OnConflict,
};
use std::time::Duration;

use crate::db::error::{RepoError, timed};
use crate::entities::{permissions, users_permissions};
use crate::models::permission::Permissions;

pub struct PermissionRepository {
    conn: DatabaseConnection,
    timeout: Duration,
}

impl PermissionRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection, timeout: Duration) -> Self {
        Self { conn, timeout }
    }

    pub async fn get_all_for_user(&self, user_id: i32) -> Result<Permissions, RepoError> {
        timed(self.timeout, async {
            let codes: Vec<String> = permissions::Entity::find()
                .select_only()
                .column(permissions::Column::Code)
                .join(
                    JoinType::InnerJoin,
                    permissions::Relation::UsersPermissions.def(),
                )
                .filter(users_permissions::Column::UserId.eq(user_id))
                .into_tuple()
                .all(&self.conn)
                .await?;
            Ok(Permissions(codes))
        })
        .await
    }

    /// Grants `codes` to the user. Already-held codes are left alone; an
    /// unknown code fails the whole call with `RecordNotFound`.
    pub async fn add_for_user(&self, user_id: i32, codes: &[String]) -> Result<(), RepoError> {
        let mut wanted = codes.to_vec();
        wanted.sort();
        wanted.dedup();

        timed(self.timeout, async {
            let found = permissions::Entity::find()
                .filter(permissions::Column::Code.is_in(wanted.iter().cloned()))
                .all(&self.conn)
                .await?;
            if found.len() != wanted.len() {
                return Err(RepoError::RecordNotFound);
            }
            if found.is_empty() {
                return Ok(());
            }

            let rows = found.into_iter().map(|p| users_permissions::ActiveModel {
                user_id: Set(user_id),
                permission_id: Set(p.id),
            });
            users_permissions::Entity::insert_many(rows)
                .on_conflict(
                    OnConflict::columns([
                        users_permissions::Column::UserId,
                        users_permissions::Column::PermissionId,
                    ])
                    .do_nothing()
                    .to_owned(),
                )
                .do_nothing()
                .exec(&self.conn)
                .await?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use crate::db::test_store;
    use crate::db::RepoError;
    use crate::models::permission::{MOVIES_READ, MOVIES_WRITE};
    use crate::models::user::User;

    #[tokio::test]
    async fn test_grant_and_list() {
        let store = test_store().await;
        let mut user = User {
            id: 0,
            created_at: String::new(),
            name: "Carol".to_string(),
            email: "carol@example.com".to_string(),
            password_hash: "x".to_string(),
            activated: true,
            version: 0,
        };
        store.users().insert(&mut user).await.unwrap();

        let repo = store.permissions();
        assert!(repo.get_all_for_user(user.id).await.unwrap().0.is_empty());

        repo.add_for_user(user.id, &[MOVIES_READ.to_string()])
            .await
            .unwrap();
        repo.add_for_user(user.id, &[MOVIES_READ.to_string(), MOVIES_WRITE.to_string()])
            .await
            .unwrap();

        let perms = repo.get_all_for_user(user.id).await.unwrap();
        assert!(perms.includes(MOVIES_READ));
        assert!(perms.includes(MOVIES_WRITE));
        assert_eq!(perms.0.len(), 2);

        let err = repo
            .add_for_user(user.id, &["movies:burn".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::RecordNotFound));
    }
}
