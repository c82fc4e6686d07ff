use serde::{Deserialize, Serialize};

/// Operador que ejecuta una acción del workflow (id de usuario interno).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub i64);

impl ActorId {
    pub fn get(self) -> i64 { self.0 }
}

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "{}", self.0) }
}
