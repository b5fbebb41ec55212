/*!
 * Authentication request extractor
 *
 * Public API:
 * - AuthRequest
 * - SESSION_COOKIE
 */

mod core;
mod types;

pub use types::{AuthRequest, SESSION_COOKIE};
