use crate::{AuthError, User};

/// Per-request identity state, produced by the credential resolver.
///
/// Authorization checks take `Option<&RequestContext>`: `None` means the call
/// does not originate from a request (provisioning, background jobs) and is
/// not subject to authorization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    anonymous: bool,
    user: Option<User>,
    org: Option<User>,
    owner: Option<User>,
}

impl RequestContext {
    /// Context of an endpoint that does not require an identity.
    pub fn anonymous() -> Self {
        Self {
            anonymous: true,
            ..Default::default()
        }
    }

    /// Context of a request whose caller was resolved to `user`.
    pub fn authenticated(user: User) -> Self {
        Self {
            user: Some(user),
            ..Default::default()
        }
    }

    /// Context of a protected endpoint where no identity was attached.
    pub fn unresolved() -> Self {
        Self::default()
    }

    pub fn with_org(mut self, org: User) -> Self {
        self.org = Some(org);
        self
    }

    pub fn with_owner(mut self, owner: User) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn is_anonymous(&self) -> bool {
        self.anonymous
    }

    /// The calling user.
    ///
    /// `Ok(None)` on anonymous endpoints; `Unauthorized` when a protected
    /// endpoint carries no identity.
    pub fn user(&self) -> Result<Option<&User>, AuthError> {
        if self.anonymous {
            return Ok(None);
        }
        self.user.as_ref().map(Some).ok_or(AuthError::Unauthorized)
    }

    /// Name of the calling user; `Ok(None)` on anonymous endpoints.
    pub fn username(&self) -> Result<Option<&str>, AuthError> {
        Ok(self.user()?.map(|u| u.name.as_str()))
    }

    /// Organization the caller acts for, when it is an organization system user.
    pub fn org(&self) -> Option<&User> {
        self.org.as_ref()
    }

    /// Owner named by the request path, once membership was verified.
    pub fn owner(&self) -> Option<&User> {
        self.owner.as_ref()
    }
}
