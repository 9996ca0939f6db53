use serde::{Deserialize, Serialize};

fn enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    #[serde(default = "enabled")]
    pub email: bool,

    #[serde(default = "enabled")]
    pub push: bool,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            email: true,
            push: true,
        }
    }
}

/// The slice of a user-service record the workers need.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryUser {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub push_token: Option<String>,

    #[serde(default)]
    pub preferences: UserPreferences,

    #[serde(default = "enabled")]
    pub is_active: bool,
}
