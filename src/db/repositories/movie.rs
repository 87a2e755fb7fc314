use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, Order,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
    sea_query::{Expr, LikeExpr},
};
use std::time::Duration;

use crate::db::error::{RepoError, timed};
use crate::entities::movies;
use crate::models::filters::Metadata;
use crate::models::movie::{Movie, MovieQuery, Runtime};

impl TryFrom<movies::Model> for Movie {
    type Error = DbErr;

    fn try_from(model: movies::Model) -> Result<Self, Self::Error> {
        let genres = serde_json::from_str(&model.genres)
            .map_err(|e| DbErr::Json(format!("movie {} genres: {e}", model.id)))?;
        Ok(Self {
            id: model.id,
            created_at: model.created_at,
            title: model.title,
            year: model.year,
            runtime: Runtime(model.runtime),
            genres,
            version: model.version,
        })
    }
}

/// Pattern for `LIKE '%needle%' ESCAPE '\'` that matches `\`, `%` and `_`
/// in the needle literally.
fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn contains_literal(needle: &str) -> LikeExpr {
    LikeExpr::new(contains_pattern(needle)).escape('\\')
}

fn encode_genres(genres: &[String]) -> Result<String, DbErr> {
    serde_json::to_string(genres).map_err(|e| DbErr::Json(e.to_string()))
}

pub struct MovieRepository {
    conn: DatabaseConnection,
    timeout: Duration,
}

impl MovieRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection, timeout: Duration) -> Self {
        Self { conn, timeout }
    }

    /// Persists a new movie and fills in `id`, `created_at` and `version`.
    pub async fn insert(&self, movie: &mut Movie) -> Result<(), RepoError> {
        let model = movies::ActiveModel {
            title: Set(movie.title.clone()),
            year: Set(movie.year),
            runtime: Set(movie.runtime.0),
            genres: Set(encode_genres(&movie.genres)?),
            version: Set(1),
            created_at: Set(Utc::now().to_rfc3339()),
            ..Default::default()
        };

        let saved = timed(self.timeout, async { Ok(model.insert(&self.conn).await?) }).await?;

        movie.id = saved.id;
        movie.created_at = saved.created_at;
        movie.version = saved.version;
        Ok(())
    }

    pub async fn get(&self, id: i32) -> Result<Movie, RepoError> {
        if id < 1 {
            return Err(RepoError::RecordNotFound);
        }
        timed(self.timeout, async {
            let model = movies::Entity::find_by_id(id)
                .one(&self.conn)
                .await?
                .ok_or(RepoError::RecordNotFound)?;
            Ok(Movie::try_from(model)?)
        })
        .await
    }

    /// Version-checked write of every mutable column. On success the
    /// in-memory version is bumped to match storage.
    pub async fn update(&self, movie: &mut Movie) -> Result<(), RepoError> {
        let genres = encode_genres(&movie.genres)?;
        let result = timed(self.timeout, async {
            Ok(movies::Entity::update_many()
                .col_expr(movies::Column::Title, Expr::value(movie.title.clone()))
                .col_expr(movies::Column::Year, Expr::value(movie.year))
                .col_expr(movies::Column::Runtime, Expr::value(movie.runtime.0))
                .col_expr(movies::Column::Genres, Expr::value(genres))
                .col_expr(
                    movies::Column::Version,
                    Expr::col(movies::Column::Version).add(1),
                )
                .filter(movies::Column::Id.eq(movie.id))
                .filter(movies::Column::Version.eq(movie.version))
                .exec(&self.conn)
                .await?)
        })
        .await?;

        if result.rows_affected == 0 {
            return Err(RepoError::EditConflict);
        }
        movie.version += 1;
        Ok(())
    }

    pub async fn delete(&self, id: i32) -> Result<(), RepoError> {
        if id < 1 {
            return Err(RepoError::RecordNotFound);
        }
        let result = timed(self.timeout, async {
            Ok(movies::Entity::delete_by_id(id).exec(&self.conn).await?)
        })
        .await?;

        if result.rows_affected == 0 {
            return Err(RepoError::RecordNotFound);
        }
        Ok(())
    }

    /// Filtered, sorted and paginated listing.
    ///
    /// Every whitespace-separated word of `query.title` must appear in the
    /// title, and every entry of `query.genres` must be one of the movie's
    /// genres.
    pub async fn get_all(&self, query: &MovieQuery) -> Result<(Vec<Movie>, Metadata), RepoError> {
        let filters = &query.filters;
        let sort_column = match filters.sort_column() {
            "id" => movies::Column::Id,
            "title" => movies::Column::Title,
            "year" => movies::Column::Year,
            "runtime" => movies::Column::Runtime,
            other => unreachable!("sort column {other} passed the safelist"),
        };
        let order = if filters.sort_descending() {
            Order::Desc
        } else {
            Order::Asc
        };

        let mut condition = Condition::all();
        for word in query.title.split_whitespace() {
            condition =
                condition.add(Expr::col(movies::Column::Title).like(contains_literal(word)));
        }
        for genre in &query.genres {
            let quoted = serde_json::to_string(genre).map_err(|e| DbErr::Json(e.to_string()))?;
            condition =
                condition.add(Expr::col(movies::Column::Genres).like(contains_literal(&quoted)));
        }

        let select = movies::Entity::find()
            .filter(condition)
            .order_by(sort_column, order)
            .order_by_asc(movies::Column::Id);

        timed(self.timeout, async {
            let paginator = select.paginate(&self.conn, filters.page_size);
            let total = paginator.num_items().await?;
            let models = paginator.fetch_page(filters.page - 1).await?;

            let movies = models
                .into_iter()
                .map(Movie::try_from)
                .collect::<Result<Vec<_>, _>>()?;

            Ok((
                movies,
                Metadata::calculate(total, filters.page, filters.page_size),
            ))
        })
        .await
    }
}
