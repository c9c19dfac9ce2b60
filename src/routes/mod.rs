/// Router Module Index
///
/// Routes are grouped by how the gate treats them. Grouping is for reading
/// only: access is decided by the route gate middleware from the request path,
/// not by which module a route lives in.

/// Landing page and the login page.
pub mod public;

/// Pages under the private prefixes. Unauthenticated visitors are redirected
/// to the login page before reaching them.
pub mod private;

/// OAuth redirect, callback and logout.
pub mod sign_in;

/// JSON API, nested under `/api`. Never gated: answers 401 instead of redirecting.
pub mod api;
