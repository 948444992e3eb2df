pub mod health;
pub mod remote_id_tags;
