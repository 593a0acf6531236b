//! Release Store adapter: implements `ReleaseRecordStore` on the shared
//! JSON store.

use anyhow::Result;
use iris_update_common::{ReleaseStore, StoreState};

use crate::application::ports::ReleaseRecordStore;

impl ReleaseRecordStore for ReleaseStore {
    fn load_state(&self) -> Result<StoreState> {
        Ok(self.load()?)
    }

    fn save_state(&self, state: &StoreState) -> Result<()> {
        Ok(self.save(state)?)
    }
}
