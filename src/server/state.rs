use crate::settings;

#[derive(Clone)]
pub(crate) struct ServerState {
    pub(crate) settings: settings::Settings,
    pub(crate) client: reqwest::Client,
}

impl ServerState {
    pub(crate) fn new(settings: settings::Settings) -> Self {
        Self {
            settings,
            client: reqwest::Client::new(),
        }
    }
}
