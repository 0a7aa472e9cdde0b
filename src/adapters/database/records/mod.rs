pub(crate) mod user;

pub(crate) use user::UserRecord;
