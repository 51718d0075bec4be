use anyhow::Result;
use futures::TryStreamExt;
use mongodb::bson::{Bson, DateTime, doc};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument};
use mongodb::{Collection, Database, IndexModel};
use uuid::Uuid;

use crate::models::{Course, DiscountCode, Enrollment};

#[derive(Clone)]
pub struct CatalogRepository {
    course_collection: Collection<Course>,
    discount_collection: Collection<DiscountCode>,
    enrollment_collection: Collection<Enrollment>,
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        &*err.kind,
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == 11000
    )
}

impl CatalogRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            course_collection: db.collection("courses"),
            discount_collection: db.collection("discount_codes"),
            enrollment_collection: db.collection("enrollments"),
        }
    }

    pub async fn init_indexes(&self) -> Result<()> {
        let course_list_index = IndexModel::builder()
            .keys(doc! { "published": 1, "category": 1, "created_at": -1 })
            .options(
                IndexOptions::builder()
                    .name("published_category_idx".to_string())
                    .build(),
            )
            .build();

        self.course_collection
            .create_indexes([course_list_index], None)
            .await?;

        let code_index = IndexModel::builder()
            .keys(doc! { "code": 1 })
            .options(
                IndexOptions::builder()
                    .name("discount_code_idx".to_string())
                    .unique(true)
                    .build(),
            )
            .build();

        self.discount_collection
            .create_indexes([code_index], None)
            .await?;

        // One enrollment per (user, course); duplicate purchases collapse
        // onto the existing document.
        let user_course_index = IndexModel::builder()
            .keys(doc! { "user_id": 1, "course_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("user_course_enrollment_idx".to_string())
                    .unique(true)
                    .build(),
            )
            .build();

        self.enrollment_collection
            .create_indexes([user_course_index], None)
            .await?;

        tracing::info!("Catalog service indexes initialized");
        Ok(())
    }

    // Courses

    pub async fn create_course(&self, course: Course) -> Result<()> {
        self.course_collection.insert_one(course, None).await?;
        Ok(())
    }

    pub async fn get_course(&self, id: Uuid) -> Result<Option<Course>> {
        let filter = doc! { "_id": id.to_string() };
        let course = self.course_collection.find_one(filter, None).await?;
        Ok(course)
    }

    pub async fn list_published_courses(&self, category: Option<&str>) -> Result<Vec<Course>> {
        let mut filter = doc! { "published": true };
        if let Some(category) = category {
            filter.insert("category", category);
        }

        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .build();

        let cursor = self.course_collection.find(filter, Some(options)).await?;
        let courses: Vec<Course> = cursor.try_collect().await?;
        Ok(courses)
    }

    pub async fn replace_course(&self, course: &Course) -> Result<()> {
        let filter = doc! { "_id": course.id.to_string() };
        self.course_collection
            .replace_one(filter, course, None)
            .await?;
        Ok(())
    }

    // Discount codes

    /// Insert a new code. Returns `None` when the code already exists.
    pub async fn create_discount(&self, code: DiscountCode) -> Result<Option<DiscountCode>> {
        match self.discount_collection.insert_one(&code, None).await {
            Ok(_) => Ok(Some(code)),
            Err(err) if is_duplicate_key(&err) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn find_discount_by_code(&self, code: &str) -> Result<Option<DiscountCode>> {
        let filter = doc! { "code": code };
        let discount = self.discount_collection.find_one(filter, None).await?;
        Ok(discount)
    }

    /// Atomically consume one redemption of a code.
    ///
    /// The filter re-checks `active` and the redemption budget inside the
    /// same operation, so two concurrent redeemers of a single-use code get
    /// exactly one winner; the loser sees `None`.
    pub async fn redeem_discount(&self, code: &str) -> Result<Option<DiscountCode>> {
        let filter = doc! {
            "code": code,
            "active": true,
            "$or": [
                { "max_redemptions": Bson::Null },
                { "$expr": { "$lt": ["$redemption_count", "$max_redemptions"] } },
            ],
        };
        let update = doc! { "$inc": { "redemption_count": 1 } };

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        let updated = self
            .discount_collection
            .find_one_and_update(filter, update, Some(options))
            .await?;
        Ok(updated)
    }

    // Enrollments

    /// Insert an enrollment; collapses onto the existing document when the
    /// (user, course) pair is already enrolled. Returns the stored document
    /// and whether it was newly created.
    pub async fn create_enrollment(&self, enrollment: Enrollment) -> Result<(Enrollment, bool)> {
        match self
            .enrollment_collection
            .insert_one(&enrollment, None)
            .await
        {
            Ok(_) => Ok((enrollment, true)),
            Err(err) if is_duplicate_key(&err) => {
                let existing = self
                    .find_enrollment(&enrollment.user_id, enrollment.course_id)
                    .await?
                    .ok_or_else(|| {
                        anyhow::anyhow!("Enrollment vanished after duplicate key error")
                    })?;
                Ok((existing, false))
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn find_enrollment(
        &self,
        user_id: &str,
        course_id: Uuid,
    ) -> Result<Option<Enrollment>> {
        let filter = doc! { "user_id": user_id, "course_id": course_id.to_string() };
        let enrollment = self.enrollment_collection.find_one(filter, None).await?;
        Ok(enrollment)
    }

    pub async fn get_enrollment(&self, id: Uuid) -> Result<Option<Enrollment>> {
        let filter = doc! { "_id": id.to_string() };
        let enrollment = self.enrollment_collection.find_one(filter, None).await?;
        Ok(enrollment)
    }

    pub async fn list_enrollments_for_user(&self, user_id: &str) -> Result<Vec<Enrollment>> {
        let filter = doc! { "user_id": user_id };
        let options = FindOptions::builder()
            .sort(doc! { "enrolled_at": -1 })
            .build();

        let cursor = self.enrollment_collection.find(filter, Some(options)).await?;
        let enrollments: Vec<Enrollment> = cursor.try_collect().await?;
        Ok(enrollments)
    }

    /// Merge newly completed video/exercise ids into an enrollment.
    /// Progress only ever grows; ids are never removed here.
    pub async fn update_progress(
        &self,
        id: Uuid,
        completed_videos: &[String],
        completed_exercises: &[String],
    ) -> Result<Option<Enrollment>> {
        let filter = doc! { "_id": id.to_string() };
        let update = doc! {
            "$addToSet": {
                "completed_videos": { "$each": completed_videos.to_vec() },
                "completed_exercises": { "$each": completed_exercises.to_vec() },
            },
            "$set": { "updated_at": DateTime::now() },
        };

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        let updated = self
            .enrollment_collection
            .find_one_and_update(filter, update, Some(options))
            .await?;
        Ok(updated)
    }
}
