use std::{fmt, sync::Arc};

use tilecast_config::Config;
use tilecast_core::{
    DispatchConfig, DispatchCoordinator, FfmpegTranscoder, FsObjectStore, Store, TileStreamer,
};

#[derive(Clone)]
pub struct AppState {
    pub dispatch: Arc<DispatchCoordinator>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("dispatch", &self.dispatch)
            .finish()
    }
}

impl AppState {
    /// Wire the coordinator to the given capabilities.
    pub fn new(
        config: &Config,
        store: Arc<dyn Store>,
        streamer: Arc<dyn TileStreamer>,
    ) -> Self {
        let dispatch = DispatchCoordinator::new(
            DispatchConfig::with_timeout(config.dispatch.timeout),
            store,
            streamer,
        );

        Self {
            dispatch: Arc::new(dispatch),
        }
    }

    /// Production wiring: filesystem store and ffmpeg crops.
    pub fn from_config(config: &Config) -> Self {
        let mut store = FsObjectStore::new(&config.storage.result_root);
        if let Some(input_root) = &config.storage.input_root {
            store = store.with_input_root(input_root);
        }
        let streamer = FfmpegTranscoder::new(&config.ffmpeg.path);

        Self::new(config, Arc::new(store), Arc::new(streamer))
    }
}
