pub(crate) mod fetch;

pub(crate) use fetch::fetch;

use metafetch_lib::{CancellationToken, DriveClient, Request};

use crate::options::Config;

/// Parameters passed to every command
pub(crate) struct CommandParams {
    pub(crate) client: DriveClient,
    pub(crate) requests: Vec<Request>,
    pub(crate) cancel: CancellationToken,
    pub(crate) cfg: Config,
}
