pub mod form;
pub mod question;
pub mod submission;
pub mod user;

pub use form::{Form, FormPayload, FormResponse, FormSettings, PublicFormResponse};
pub use question::{Question, QuestionKind};
pub use submission::{Answer, AnswerPayload, Submission};
pub use user::{User, UserProfile, UserRole};
