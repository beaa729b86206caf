use serde::{Deserialize, Serialize};

use crate::model::ids::{RoleId, UserCode};

/// The kinds of role the clinic software knows how to present.
///
/// Backend role names are free text; [`RoleKind::classify`] folds them onto
/// this enum so every role has compile-time-checked display metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleKind {
    Administrator,
    Dentist,
    Receptionist,
    Patient,
    Unrecognized,
}

/// Visual tone for a role badge; the front end maps tones to colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BadgeTone {
    Purple,
    Green,
    Amber,
    Blue,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleDisplay {
    pub label: &'static str,
    pub description: &'static str,
    pub badge: BadgeTone,
}

impl RoleKind {
    /// Classify a backend role name, ignoring case and Spanish accents.
    #[must_use]
    pub fn classify(name: &str) -> Self {
        let folded = fold(name);
        if folded.contains("admin") {
            Self::Administrator
        } else if folded.contains("odontolog") || folded.contains("dentist") {
            Self::Dentist
        } else if folded.contains("recepcion") || folded.contains("reception") {
            Self::Receptionist
        } else if folded.contains("paciente") || folded.contains("patient") {
            Self::Patient
        } else {
            Self::Unrecognized
        }
    }

    #[must_use]
    pub fn display(self) -> RoleDisplay {
        match self {
            Self::Administrator => RoleDisplay {
                label: "Administrador",
                description: "Acceso completo al sistema",
                badge: BadgeTone::Purple,
            },
            Self::Dentist => RoleDisplay {
                label: "Odontólogo",
                description: "Profesional de la salud dental",
                badge: BadgeTone::Green,
            },
            Self::Receptionist => RoleDisplay {
                label: "Recepcionista",
                description: "Personal administrativo",
                badge: BadgeTone::Amber,
            },
            Self::Patient => RoleDisplay {
                label: "Paciente",
                description: "Usuario que recibe atención",
                badge: BadgeTone::Blue,
            },
            Self::Unrecognized => RoleDisplay {
                label: "Rol sin clasificar",
                description: "",
                badge: BadgeTone::Neutral,
            },
        }
    }

    #[must_use]
    pub fn is_staff(self) -> bool {
        matches!(self, Self::Administrator | Self::Dentist)
    }
}

fn fold(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'á' => 'a',
            'é' => 'e',
            'í' => 'i',
            'ó' => 'o',
            'ú' | 'ü' => 'u',
            other => other,
        })
        .collect()
}

/// A role (user type) as defined on the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    id: RoleId,
    name: String,
    kind: RoleKind,
}

impl Role {
    #[must_use]
    pub fn new(id: RoleId, name: impl Into<String>) -> Self {
        let name = name.into();
        let kind = RoleKind::classify(&name);
        Self { id, name, kind }
    }

    #[must_use]
    pub fn id(&self) -> RoleId {
        self.id
    }

    /// Name exactly as the backend spells it.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> RoleKind {
        self.kind
    }

    #[must_use]
    pub fn display(&self) -> RoleDisplay {
        self.kind.display()
    }
}

/// The known set of roles; a user's role must reference one of these.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleSet {
    roles: Vec<Role>,
}

impl RoleSet {
    #[must_use]
    pub fn new(mut roles: Vec<Role>) -> Self {
        roles.sort_by_key(Role::id);
        roles.dedup_by_key(|r| r.id());
        Self { roles }
    }

    #[must_use]
    pub fn get(&self, id: RoleId) -> Option<&Role> {
        self.roles
            .binary_search_by_key(&id, Role::id)
            .ok()
            .map(|idx| &self.roles[idx])
    }

    #[must_use]
    pub fn contains(&self, id: RoleId) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Role> {
        self.roles.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

/// A user account with its single role assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAccount {
    pub code: UserCode,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role_id: RoleId,
    pub role_name: Option<String>,
}

impl UserAccount {
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_owned()
    }

    #[must_use]
    pub fn role_kind(&self) -> RoleKind {
        self.role_name
            .as_deref()
            .map_or(RoleKind::Unrecognized, RoleKind::classify)
    }
}
