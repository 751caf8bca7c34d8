use std::collections::{HashMap, HashSet};

use crate::proto::methods;

/// Role allowed to administer the catalog.
pub const ROLE_ADMIN: &str = "admin";
/// Role allowed to rate laptops.
pub const ROLE_USER: &str = "user";

/// Static table from full RPC method name to the roles allowed to call it.
///
/// Methods absent from the table are public.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessRules {
    rules: HashMap<String, HashSet<String>>,
}

impl AccessRules {
    /// Builds rules from `(method, roles)` pairs.
    pub fn new<M, R, I>(rules: I) -> Self
    where
        I: IntoIterator<Item = (M, Vec<R>)>,
        M: Into<String>,
        R: Into<String>,
    {
        Self {
            rules: rules
                .into_iter()
                .map(|(method, roles)| {
                    (method.into(), roles.into_iter().map(Into::into).collect())
                })
                .collect(),
        }
    }

    /// Roles permitted for `method`, or `None` when the method is public.
    pub fn required_roles(&self, method: &str) -> Option<&HashSet<String>> {
        self.rules.get(method)
    }

    /// Methods that require a token, for configuring clients.
    pub fn protected_methods(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }
}

impl Default for AccessRules {
    fn default() -> Self {
        Self::new([
            (methods::CREATE_LAPTOP, vec![ROLE_ADMIN]),
            (methods::UPLOAD_IMAGE, vec![ROLE_ADMIN]),
            (methods::RATE_LAPTOP, vec![ROLE_ADMIN, ROLE_USER]),
        ])
    }
}
