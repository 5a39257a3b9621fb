use derive_more::Display;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Display)]
pub enum Role {
    #[display(fmt = "admin")]
    Admin = 1,
    #[display(fmt = "supplier")]
    Supplier = 2,
}

impl Role {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Role::Admin),
            2 => Some(Role::Supplier),
            _ => None,
        }
    }

    pub fn id(self) -> u8 {
        self as u8
    }
}
