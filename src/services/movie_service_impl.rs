//! `SeaORM` implementation of the `MovieService` trait.

use async_trait::async_trait;
use tracing::info;

use crate::db::Store;
use crate::models::filters::Metadata;
use crate::models::movie::{Movie, MovieInput, MovieQuery, validate_movie};
use crate::models::validator::Validator;
use crate::services::movie_service::{MovieError, MovieService};

pub struct SeaOrmMovieService {
    store: Store,
}

impl SeaOrmMovieService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }
}

fn validate(movie: &Movie) -> Result<(), MovieError> {
    let mut v = Validator::new();
    validate_movie(&mut v, movie);
    v.finish().map_err(MovieError::Validation)
}

#[async_trait]
impl MovieService for SeaOrmMovieService {
    async fn create(&self, input: MovieInput) -> Result<Movie, MovieError> {
        let mut movie = input.into_new_movie();
        validate(&movie)?;

        self.store.movies().insert(&mut movie).await?;
        info!(movie_id = movie.id, "Movie created");
        Ok(movie)
    }

    async fn get(&self, id: i32) -> Result<Movie, MovieError> {
        Ok(self.store.movies().get(id).await?)
    }

    async fn update(
        &self,
        id: i32,
        patch: MovieInput,
        expected_version: Option<i32>,
    ) -> Result<Movie, MovieError> {
        let repo = self.store.movies();
        let mut movie = repo.get(id).await?;

        if expected_version.is_some_and(|v| v != movie.version) {
            return Err(MovieError::EditConflict);
        }

        patch.apply_to(&mut movie);
        validate(&movie)?;

        repo.update(&mut movie).await?;
        info!(movie_id = movie.id, version = movie.version, "Movie updated");
        Ok(movie)
    }

    async fn delete(&self, id: i32) -> Result<(), MovieError> {
        self.store.movies().delete(id).await?;
        info!(movie_id = id, "Movie deleted");
        Ok(())
    }

    async fn list(&self, query: MovieQuery) -> Result<(Vec<Movie>, Metadata), MovieError> {
        Ok(self.store.movies().get_all(&query).await?)
    }
}
