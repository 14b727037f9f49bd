//! Router Module Index
//!
//! Organizes the application's routing into access-segregated modules. The
//! route guard middleware classifies *every* request by path, so the split
//! here mirrors the guard's route classes and keeps each surface explicit.

/// Authentication entry points and other unguarded endpoints (`/login`,
/// `/signup`, `/logout`, `/health`). The guard bounces already-authenticated
/// users away from the entry pages.
pub mod public;

/// The dashboard area (`/dashboard`, `/transactions`, `/simulator`) and the
/// JSON API behind it. Pages are protected by the guard's prefix rules; the
/// API handlers authenticate per request via the `CurrentUser` extractor.
pub mod portal;

/// The toast notification channel consumed by every page's display layer.
pub mod notices;
