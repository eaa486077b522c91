use tracing::info;

use super::{MovieRating, MovieReview, Review, ReviewError, UserReview};
use crate::db::Database;
use crate::db_params;

const MIN_RATING: i64 = 1;
const MAX_RATING: i64 = 5;

/// Review operations. Edits and deletes only touch the caller's own rows.
#[derive(Clone)]
pub struct ReviewController {
    db: Database,
}

impl ReviewController {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Store a review and return its id.
    pub async fn add_review(
        &self,
        user_id: i64,
        movie_id: &str,
        text: &str,
        rating: i64,
    ) -> Result<i64, ReviewError> {
        let text = validate(text, rating)?;
        let mut conn = self.db.connect_write().await?;
        let row = conn
            .query_one(
                "INSERT INTO reviews (user_id, movie_id, review_text, rating) \
                 VALUES (?, ?, ?, ?) RETURNING id",
                db_params![user_id, movie_id, text, rating],
            )
            .await?;
        conn.finish().await?;

        let id = row
            .map(|r| r.get::<i64>("id"))
            .transpose()?
            .unwrap_or_default();
        info!(review_id = id, user_id, movie_id, "Added review");
        Ok(id)
    }

    /// Returns `false` when the review is missing or owned by someone else.
    pub async fn update_review(
        &self,
        review_id: i64,
        user_id: i64,
        text: &str,
        rating: i64,
    ) -> Result<bool, ReviewError> {
        let text = validate(text, rating)?;
        let mut conn = self.db.connect_write().await?;
        let cursor = conn
            .execute(
                "UPDATE reviews SET review_text = ?, rating = ? WHERE id = ? AND user_id = ?",
                db_params![text, rating, review_id, user_id],
            )
            .await?;
        conn.finish().await?;
        Ok(cursor.rows_affected() > 0)
    }

    /// Returns `false` when the review is missing or owned by someone else.
    pub async fn delete_review(&self, review_id: i64, user_id: i64) -> Result<bool, ReviewError> {
        let mut conn = self.db.connect_write().await?;
        let cursor = conn
            .execute(
                "DELETE FROM reviews WHERE id = ? AND user_id = ?",
                db_params![review_id, user_id],
            )
            .await?;
        conn.finish().await?;
        Ok(cursor.rows_affected() > 0)
    }

    /// Reviews of a movie with author details, newest first.
    pub async fn get_movie_reviews(&self, movie_id: &str) -> Result<Vec<MovieReview>, ReviewError> {
        let mut conn = self.db.connect().await?;
        let rows = conn
            .query_all(
                "SELECT r.id, r.user_id, r.review_text, r.rating, r.created_at, \
                 u.nickname AS user_nickname, u.profile_pic AS user_profile_pic \
                 FROM reviews r JOIN users u ON r.user_id = u.id \
                 WHERE r.movie_id = ? ORDER BY r.created_at DESC, r.id DESC",
                db_params![movie_id],
            )
            .await?;
        conn.close().await?;
        Ok(rows
            .iter()
            .map(MovieReview::from_row)
            .collect::<Result<_, _>>()?)
    }

    pub async fn get_user_reviews(&self, user_id: i64) -> Result<Vec<Review>, ReviewError> {
        let mut conn = self.db.connect().await?;
        let rows = conn
            .query_all(
                "SELECT id, user_id, movie_id, review_text, rating, created_at \
                 FROM reviews WHERE user_id = ? ORDER BY created_at DESC, id DESC",
                db_params![user_id],
            )
            .await?;
        conn.close().await?;
        Ok(rows
            .iter()
            .map(Review::from_row)
            .collect::<Result<_, _>>()?)
    }

    /// A user's reviews with movie title and poster, newest first.
    pub async fn get_user_reviews_with_movies(
        &self,
        user_id: i64,
    ) -> Result<Vec<UserReview>, ReviewError> {
        let mut conn = self.db.connect().await?;
        let rows = conn
            .query_all(
                "SELECT r.id, r.movie_id, r.review_text, r.rating, r.created_at, \
                 m.title AS movie_title, m.poster AS movie_poster \
                 FROM reviews r JOIN movies m ON r.movie_id = m.imdb_id \
                 WHERE r.user_id = ? ORDER BY r.created_at DESC, r.id DESC",
                db_params![user_id],
            )
            .await?;
        conn.close().await?;
        Ok(rows
            .iter()
            .map(UserReview::from_row)
            .collect::<Result<_, _>>()?)
    }

    pub async fn get_user_review_count(&self, user_id: i64) -> Result<u64, ReviewError> {
        let mut conn = self.db.connect().await?;
        let row = conn
            .query_one(
                "SELECT COUNT(*) AS total FROM reviews WHERE user_id = ?",
                db_params![user_id],
            )
            .await?;
        conn.close().await?;
        Ok(row
            .map(|r| r.get::<u64>("total"))
            .transpose()?
            .unwrap_or(0))
    }

    /// Count and average from the `movie_ratings` view.
    pub async fn get_movie_rating(&self, movie_id: &str) -> Result<MovieRating, ReviewError> {
        let mut conn = self.db.connect().await?;
        let row = conn
            .query_one(
                "SELECT review_count, average_rating FROM movie_ratings WHERE movie_id = ?",
                db_params![movie_id],
            )
            .await?;
        conn.close().await?;
        match row {
            Some(row) => Ok(MovieRating {
                review_count: row.get("review_count")?,
                average_rating: row.get("average_rating")?,
            }),
            None => Ok(MovieRating::default()),
        }
    }
}

fn validate(text: &str, rating: i64) -> Result<&str, ReviewError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ReviewError::Validation("Review text is required".to_string()));
    }
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(ReviewError::Validation(format!(
            "Rating must be between {} and {}",
            MIN_RATING, MAX_RATING
        )));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::{insert_movie, insert_user, test_database};
    use tempfile::TempDir;

    async fn setup(dir: &TempDir) -> (ReviewController, i64, i64) {
        let db = test_database(dir).await;
        insert_movie(&db, "tt0113277", "Heat", true, None).await;
        let alice = insert_user(&db, "alice@example.com").await;
        let bob = insert_user(&db, "bob@example.com").await;
        (ReviewController::new(db), alice, bob)
    }

    #[tokio::test]
    async fn test_add_and_list() {
        let dir = TempDir::new().unwrap();
        let (reviews, alice, bob) = setup(&dir).await;

        let first = reviews.add_review(alice, "tt0113277", "Great", 5).await.unwrap();
        let second = reviews.add_review(bob, "tt0113277", "Long", 3).await.unwrap();
        assert!(second > first);

        let listed = reviews.get_movie_reviews("tt0113277").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second);
        assert_eq!(listed[0].user_nickname, "bob");

        let mine = reviews.get_user_reviews_with_movies(alice).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].movie_title, "Heat");
        assert_eq!(reviews.get_user_reviews(alice).await.unwrap().len(), 1);
        assert_eq!(reviews.get_user_review_count(alice).await.unwrap(), 1);

        let rating = reviews.get_movie_rating("tt0113277").await.unwrap();
        assert_eq!(rating.review_count, 2);
        assert_eq!(rating.average_rating, Some(4.0));
    }

    #[tokio::test]
    async fn test_validation() {
        let dir = TempDir::new().unwrap();
        let (reviews, alice, _) = setup(&dir).await;

        for (text, rating) in [("  ", 3), ("ok", 0), ("ok", 6)] {
            assert!(matches!(
                reviews.add_review(alice, "tt0113277", text, rating).await,
                Err(ReviewError::Validation(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_only_owner_can_edit_or_delete() {
        let dir = TempDir::new().unwrap();
        let (reviews, alice, bob) = setup(&dir).await;
        let id = reviews.add_review(alice, "tt0113277", "Great", 5).await.unwrap();

        assert!(!reviews.update_review(id, bob, "Meh", 2).await.unwrap());
        assert!(!reviews.delete_review(id, bob).await.unwrap());
        assert!(!reviews.delete_review(id + 100, alice).await.unwrap());

        assert!(reviews.update_review(id, alice, "Still great", 4).await.unwrap());
        let listed = reviews.get_user_reviews(alice).await.unwrap();
        assert_eq!(listed[0].review_text, "Still great");
        assert_eq!(listed[0].rating, 4);

        assert!(reviews.delete_review(id, alice).await.unwrap());
        assert_eq!(
            reviews.get_movie_rating("tt0113277").await.unwrap(),
            crate::reviews::MovieRating {
                review_count: 0,
                average_rating: None
            }
        );
    }
}
