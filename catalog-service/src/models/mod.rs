pub mod course;
pub mod discount;
pub mod enrollment;

pub use course::{Course, CourseModule, Instructor};
pub use discount::{DiscountCode, DiscountScope, DiscountType};
pub use enrollment::{Enrollment, EnrollmentSource};
