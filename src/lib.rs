pub mod api;
pub mod app;
mod components;
pub mod models;
pub mod pages;
pub mod state;
pub mod tree;
pub mod util;

pub use api::{
    ApiClient, ApiResult, EnvConfig, FailureKind, RemoteOperationFailed, StoryApi, WorkspaceApi,
};
pub use app::App;
pub use models::{File, FileId, Folder, FolderId};
pub use state::{
    AppContext, AppState, AutosaveCoordinator, SaveStatus, StoryStore, WorkspaceStore,
};

use leptos::prelude::*;

// Needed for `#[wasm_bindgen(start)]` on the wasm entrypoint.
#[cfg(all(target_arch = "wasm32", not(test)))]
use wasm_bindgen::prelude::wasm_bindgen;

#[cfg_attr(all(target_arch = "wasm32", not(test)), wasm_bindgen(start))]
pub fn main() {
    console_error_panic_hook::set_once();
    mount_to_body(App);
}
