use crate::components::{
    Banner, Panel, PanelHeader, SaveIndicator, BUTTON_CLASS, ICON_BUTTON_CLASS, INPUT_CLASS,
    PRIMARY_BUTTON_CLASS, TREE_ROW_CLASS,
};
use crate::models::{File, FileId, Folder, FolderId, TimelineEntry};
use crate::state::{AppContext, AppState, SaveStatus};
use crate::util::is_blank;
use icons::{ChevronDown, ChevronRight, X};
use leptos::prelude::*;
use leptos::task::spawn_local;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ItemKind {
    File,
    Folder,
}

/// Shared create/rename dialog state for the explorer.
#[derive(Clone, Copy)]
struct ExplorerDialog {
    create_kind: RwSignal<Option<ItemKind>>,
    rename_target: RwSignal<Option<(ItemKind, i64)>>,
    name: RwSignal<String>,
    error: RwSignal<Option<String>>,
    busy: RwSignal<bool>,
}

impl ExplorerDialog {
    fn new() -> Self {
        Self {
            create_kind: RwSignal::new(None),
            rename_target: RwSignal::new(None),
            name: RwSignal::new(String::new()),
            error: RwSignal::new(None),
            busy: RwSignal::new(false),
        }
    }

    fn open_create(&self, kind: ItemKind) {
        self.rename_target.set(None);
        self.create_kind.set(Some(kind));
        self.name.set(String::new());
        self.error.set(None);
    }

    fn open_rename(&self, kind: ItemKind, id: i64, current_name: String) {
        self.create_kind.set(None);
        self.rename_target.set(Some((kind, id)));
        self.name.set(current_name);
        self.error.set(None);
    }

    fn close(&self) {
        self.create_kind.set(None);
        self.rename_target.set(None);
        self.busy.set(false);
    }

    fn is_open(&self) -> bool {
        self.create_kind.get().is_some() || self.rename_target.get().is_some()
    }

    fn title(&self) -> &'static str {
        match (self.create_kind.get(), self.rename_target.get()) {
            (Some(ItemKind::File), _) => "New file",
            (Some(ItemKind::Folder), _) => "New folder",
            (None, Some(_)) => "Rename",
            (None, None) => "",
        }
    }
}

async fn submit_dialog(state: &AppState, dialog: ExplorerDialog, name: String) -> Result<(), String> {
    let store = &state.store;
    let target = state.target_folder_id.get_untracked();

    let result = match (
        dialog.create_kind.get_untracked(),
        dialog.rename_target.get_untracked(),
    ) {
        (Some(ItemKind::File), _) => store.create_file(&name, "", target).await.map(|_| ()),
        (Some(ItemKind::Folder), _) => store.create_folder(&name, target).await.map(|_| ()),
        (None, Some((ItemKind::File, id))) => store.rename_file(id, &name).await.map(|f| {
            store.refresh_current_file(&f);
        }),
        (None, Some((ItemKind::Folder, id))) => store.rename_folder(id, &name).await.map(|_| ()),
        (None, None) => Ok(()),
    };

    result.map_err(|e| e.message)
}

#[component]
pub fn WorkspacePage() -> impl IntoView {
    let app_state = expect_context::<AppContext>();

    let store = app_state.0.store.clone();
    spawn_local(async move {
        let _ = store.load().await;
    });

    let story = app_state.0.story.clone();
    spawn_local(async move {
        let _ = story.load().await;
    });

    view! {
        <div class="min-h-screen bg-background">
            <div class="flex h-screen">
                <div class="w-80 flex-shrink-0">
                    <FileExplorer />
                </div>
                <div class="flex flex-1 flex-col">
                    <EditorPane />
                </div>
            </div>
        </div>
    }
}

#[component]
fn EditorPane() -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let current = app_state.0.store.current_file();
    let coordinator = app_state.0.coordinator().clone();
    let buffer = coordinator.buffer();
    let status = coordinator.status();
    let timers = app_state.0.autosave.clone();

    let on_input = {
        let timers = timers.clone();
        move |ev: web_sys::Event| timers.content_changed(&event_target_value(&ev))
    };
    let on_keydown = {
        let timers = timers.clone();
        move |ev: web_sys::KeyboardEvent| {
            if (ev.ctrl_key() || ev.meta_key()) && ev.key().eq_ignore_ascii_case("s") {
                ev.prevent_default();
                timers.save();
            }
        }
    };
    let on_save = move |_: web_sys::MouseEvent| timers.save();
    let saving = move || status.with(|s| *s == SaveStatus::Saving);
    let title = move || current.with(|f| f.as_ref().map(|f| f.name.clone()).unwrap_or_default());

    view! {
        <Show
            when=move || current.with(|f| f.is_some())
            fallback=|| view! {
                <div class="flex flex-1 items-center justify-center text-sm text-muted-foreground">
                    "Select a file from the explorer or create a new one."
                </div>
            }
        >
            <div class="flex items-center justify-between border-b px-6 py-4">
                <div class="flex items-center gap-3">
                    <h1 class="text-lg font-semibold">{title}</h1>
                    <SaveIndicator status=status />
                </div>
                <button
                    class=PRIMARY_BUTTON_CLASS
                    disabled=saving
                    on:click=on_save.clone()
                >
                    {move || if saving() { "Saving..." } else { "Save" }}
                </button>
            </div>
            <textarea
                class="flex-1 resize-none p-6 font-serif text-base outline-none"
                placeholder="Start writing..."
                prop:value=move || buffer.get()
                on:input=on_input.clone()
                on:keydown=on_keydown.clone()
            />
            <StoryPanel />
        </Show>
    }
}

/// Milestones and story-graph links of the open file.
#[component]
fn StoryPanel() -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let current = app_state.0.store.current_file();
    let story = app_state.0.story.clone();

    let milestone = RwSignal::new(String::new());
    let link_target = RwSignal::new(String::new());
    let error = RwSignal::new(None::<String>);

    let file_id = move || current.with(|f| f.as_ref().map(|f| f.id));

    let milestones = {
        let story = story.clone();
        move || file_id().map(|id| story.milestones_for(id)).unwrap_or_default()
    };
    let node = {
        let story = story.clone();
        move || file_id().and_then(|id| story.node_for_file(id))
    };
    let links = {
        let story = story.clone();
        let node = node.clone();
        move || {
            node()
                .map(|n| story.linked_nodes(n.id))
                .unwrap_or_default()
                .into_iter()
                .map(|n| n.node_name)
                .collect::<Vec<_>>()
                .join(", ")
        }
    };
    let other_nodes = {
        let story = story.clone();
        let node = node.clone();
        move || {
            let own = node().map(|n| n.id);
            story
                .nodes()
                .into_iter()
                .filter(|n| Some(n.id) != own)
                .collect::<Vec<_>>()
        }
    };

    let on_add_milestone = {
        let story = story.clone();
        move |ev: web_sys::SubmitEvent| {
            ev.prevent_default();
            let Some(id) = current.with_untracked(|f| f.as_ref().map(|f| f.id)) else {
                return;
            };
            let name = milestone.get_untracked();
            if is_blank(&name) {
                return;
            }
            let story = story.clone();
            spawn_local(async move {
                match story.add_milestone(id, &name, None).await {
                    Ok(_) => {
                        milestone.set(String::new());
                        error.set(None);
                    }
                    Err(e) => error.set(Some(e.message)),
                }
            });
        }
    };

    let on_add_node = {
        let story = story.clone();
        move |_: web_sys::MouseEvent| {
            let Some((id, name)) =
                current.with_untracked(|f| f.as_ref().map(|f| (f.id, f.name.clone())))
            else {
                return;
            };
            let story = story.clone();
            spawn_local(async move {
                if let Err(e) = story.add_node(id, &name, None).await {
                    error.set(Some(e.message));
                }
            });
        }
    };

    let on_link = {
        let story = story.clone();
        let node = node.clone();
        move |_: web_sys::MouseEvent| {
            let Some(from) = untrack(|| node()).map(|n| n.id) else {
                return;
            };
            let Ok(to) = link_target.get_untracked().parse::<i64>() else {
                return;
            };
            let story = story.clone();
            spawn_local(async move {
                match story.link(from, to).await {
                    Ok(_) => {
                        link_target.set(String::new());
                        error.set(None);
                    }
                    Err(e) => error.set(Some(e.message)),
                }
            });
        }
    };

    let graph = move || match node() {
        None => view! {
            <button class=BUTTON_CLASS on:click=on_add_node.clone()>"Add to story graph"</button>
        }
        .into_any(),
        Some(_) => {
            let links = links.clone();
            let other_nodes = other_nodes.clone();
            view! {
                <span class="text-muted-foreground">"Linked:"</span>
                <span class="flex-1 truncate">{links}</span>
                <select
                    class="h-8 rounded-md border bg-transparent px-2"
                    prop:value=move || link_target.get()
                    on:change=move |ev: web_sys::Event| link_target.set(event_target_value(&ev))
                >
                    <option value="">"Link to..."</option>
                    {move || {
                        other_nodes()
                            .into_iter()
                            .map(|n| view! { <option value=n.id.to_string()>{n.node_name}</option> })
                            .collect_view()
                    }}
                </select>
                <button
                    class=BUTTON_CLASS
                    disabled=move || link_target.get().is_empty()
                    on:click=on_link.clone()
                >
                    "Link"
                </button>
            }
            .into_any()
        }
    };

    view! {
        <div class="border-t px-6 py-3 text-sm">
            <h3 class="mb-2 text-xs font-semibold uppercase text-muted-foreground">"Milestones"</h3>
            <ul class="mb-2 space-y-1">
                <For
                    each=milestones
                    key=|e: &TimelineEntry| e.id
                    children=move |e: TimelineEntry| view! {
                        <li class="flex justify-between">
                            <span>{e.milestone_name}</span>
                            <span class="text-xs text-muted-foreground">{e.timestamp}</span>
                        </li>
                    }
                />
            </ul>
            <form class="flex gap-2" on:submit=on_add_milestone>
                <input
                    class=INPUT_CLASS
                    placeholder="New milestone"
                    prop:value=move || milestone.get()
                    on:input=move |ev: web_sys::Event| milestone.set(event_target_value(&ev))
                />
                <button type="submit" class=BUTTON_CLASS>"Add"</button>
            </form>
            <div class="mt-3 flex items-center gap-2 text-xs">{graph}</div>
            <Show when=move || error.get().is_some() fallback=|| ()>
                <p class="mt-2 text-xs text-destructive">{move || error.get().unwrap_or_default()}</p>
            </Show>
        </div>
    }
}

#[component]
pub fn FileExplorer() -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let dialog = ExplorerDialog::new();
    provide_context(dialog);

    let load_error = app_state.0.store.error();
    let retry_store = StoredValue::new_local(app_state.0.store.clone());
    let on_retry = move |_: web_sys::MouseEvent| {
        let store = retry_store.get_value();
        spawn_local(async move {
            let _ = store.load().await;
        });
    };

    view! {
        <Panel>
            <PanelHeader>
                <div class="mb-4 flex items-center justify-between">
                    <h2 class="text-sm font-semibold">"Explorer"</h2>
                    <div class="flex gap-1">
                        <button class=BUTTON_CLASS on:click=move |_| dialog.open_create(ItemKind::File)>
                            "File"
                        </button>
                        <button class=BUTTON_CLASS on:click=move |_| dialog.open_create(ItemKind::Folder)>
                            "Folder"
                        </button>
                    </div>
                </div>
                <Breadcrumb />
                <Show when=move || load_error.get().is_some() fallback=|| ()>
                    <Banner>
                        <div class="flex items-center justify-between gap-2">
                            <span>{move || load_error.get().unwrap_or_default()}</span>
                            <button class=BUTTON_CLASS on:click=on_retry.clone()>"Retry"</button>
                        </div>
                    </Banner>
                </Show>
                <Show when=move || dialog.error.get().is_some() && !dialog.is_open() fallback=|| ()>
                    <Banner>{move || dialog.error.get().unwrap_or_default()}</Banner>
                </Show>
                <NameDialog />
            </PanelHeader>
            <div class="p-2">
                <FolderChildren parent_id=None />
                <Unfiled />
            </div>
        </Panel>
    }
}

/// Where new items will be created.
#[component]
fn Breadcrumb() -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let target = app_state.0.target_folder_id;
    let store = app_state.0.store.clone();

    let path = move || {
        target
            .get()
            .map(|id| store.folder_path(id))
            .unwrap_or_default()
    };

    view! {
        <Show when=move || target.get().is_some() fallback=|| ()>
            <div class="mb-2 text-xs text-muted-foreground">
                <button class="hover:text-foreground" on:click=move |_| target.set(None)>"Root"</button>
                {
                    let path = path.clone();
                    move || {
                        path()
                            .into_iter()
                            .map(|f| view! {
                                <span class="mx-1">"/"</span>
                                <span>{f.name}</span>
                            })
                            .collect_view()
                    }
                }
            </div>
        </Show>
    }
}

#[component]
fn NameDialog() -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let dialog = expect_context::<ExplorerDialog>();
    let state = app_state.0.clone();

    let on_submit = move |ev: web_sys::SubmitEvent| {
        ev.prevent_default();

        let name = dialog.name.get_untracked();
        if is_blank(&name) {
            return;
        }

        dialog.busy.set(true);
        dialog.error.set(None);

        let state = state.clone();
        spawn_local(async move {
            let result = submit_dialog(&state, dialog, name).await;
            dialog.busy.set(false);
            match result {
                Ok(()) => dialog.close(),
                Err(e) => dialog.error.set(Some(e)),
            }
        });
    };

    view! {
        <Show when=move || dialog.is_open() fallback=|| ()>
            <div class="fixed inset-0 z-50 flex items-center justify-center bg-black/40">
                <form
                    class="w-80 space-y-4 rounded-lg border bg-background p-4 shadow-lg"
                    on:submit=on_submit.clone()
                >
                    <h3 class="text-sm font-semibold">{move || dialog.title()}</h3>
                    <input
                        class=INPUT_CLASS
                        placeholder="Name"
                        prop:value=move || dialog.name.get()
                        on:input=move |ev: web_sys::Event| dialog.name.set(event_target_value(&ev))
                    />
                    <Show when=move || dialog.error.get().is_some() fallback=|| ()>
                        <p class="text-xs text-destructive">{move || dialog.error.get().unwrap_or_default()}</p>
                    </Show>
                    <div class="flex justify-end gap-2">
                        <button type="button" class=BUTTON_CLASS on:click=move |_| dialog.close()>
                            "Cancel"
                        </button>
                        <button
                            type="submit"
                            class=PRIMARY_BUTTON_CLASS
                            disabled=move || dialog.busy.get() || is_blank(&dialog.name.get())
                        >
                            "OK"
                        </button>
                    </div>
                </form>
            </div>
        </Show>
    }
}

/// Files first, then folders, each in store order.
#[component]
fn FolderChildren(parent_id: Option<FolderId>) -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let files_store = app_state.0.store.clone();
    let folders_store = app_state.0.store.clone();

    view! {
        <For
            each=move || files_store.child_files(parent_id)
            key=|f: &File| (f.id, f.name.clone())
            children=move |file: File| view! { <FileRow file=file /> }
        />
        <For
            each=move || folders_store.child_folders(parent_id)
            key=|f: &Folder| (f.id, f.name.clone())
            children=move |folder: Folder| view! { <FolderRow folder=folder /> }
        />
    }
    .into_any()
}

/// Entries whose folder no longer exists.
#[component]
fn Unfiled() -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let store = app_state.0.store.clone();
    let files_store = store.clone();
    let folders_store = store.clone();

    let has_orphans =
        move || !store.orphan_files().is_empty() || !store.orphan_folders().is_empty();

    view! {
        <Show when=has_orphans.clone() fallback=|| ()>
            <div class="mt-4 border-t pt-2">
                <div class="px-2 pb-1 text-xs uppercase text-muted-foreground">"Unfiled"</div>
                <For
                    each={
                        let s = files_store.clone();
                        move || s.orphan_files()
                    }
                    key=|f: &File| (f.id, f.name.clone())
                    children=move |file: File| view! { <FileRow file=file /> }
                />
                <For
                    each={
                        let s = folders_store.clone();
                        move || s.orphan_folders()
                    }
                    key=|f: &Folder| (f.id, f.name.clone())
                    children=move |folder: Folder| view! { <FolderRow folder=folder /> }
                />
            </div>
        </Show>
    }
}

#[component]
fn FileRow(file: File) -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let dialog = expect_context::<ExplorerDialog>();
    let id: FileId = file.id;
    let name = file.name.clone();

    let state = app_state.0.clone();
    let selected = move || state.is_selected(id);

    let state = app_state.0.clone();
    let on_select = move |_| {
        let latest = state.store.file(id);
        state.coordinator().open_file(latest);
    };

    let rename_name = name.clone();
    let on_rename = move |ev: web_sys::MouseEvent| {
        ev.stop_propagation();
        dialog.open_rename(ItemKind::File, id, rename_name.clone());
    };

    let timers = app_state.0.autosave.clone();
    let on_delete = move |ev: web_sys::MouseEvent| {
        ev.stop_propagation();
        timers.delete_file(id, move |e| dialog.error.set(Some(e.message)));
    };

    view! {
        <div
            class=move || {
                if selected() {
                    format!("{TREE_ROW_CLASS} bg-accent")
                } else {
                    TREE_ROW_CLASS.to_string()
                }
            }
            on:click=on_select
        >
            <span class="flex min-w-0 flex-1 items-center gap-2">
                <svg
                    xmlns="http://www.w3.org/2000/svg"
                    viewBox="0 0 24 24"
                    class="size-4 flex-shrink-0 text-muted-foreground"
                    fill="none"
                    stroke="currentColor"
                    stroke-width="2"
                    stroke-linecap="round"
                    stroke-linejoin="round"
                    aria-hidden="true"
                >
                    <path d="M14 2H6a2 2 0 0 0-2 2v16a2 2 0 0 0 2 2h12a2 2 0 0 0 2-2V8z" />
                    <path d="M14 2v6h6" />
                </svg>
                <span class="truncate">{name}</span>
            </span>
            <span class="flex items-center gap-0.5">
                <button class=ICON_BUTTON_CLASS title="Rename" on:click=on_rename>"Aa"</button>
                <button class=ICON_BUTTON_CLASS title="Delete" on:click=on_delete>
                    <X class="size-3".to_string() />
                </button>
            </span>
        </div>
    }
}

#[component]
fn FolderRow(folder: Folder) -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let dialog = expect_context::<ExplorerDialog>();
    let id: FolderId = folder.id;
    let name = folder.name.clone();

    let state = app_state.0.clone();
    let expanded = move || state.is_expanded(id);

    let state = app_state.0.clone();
    let on_toggle = move |_| {
        state.toggle_folder(id);
        state.target_folder_id.set(Some(id));
    };

    let rename_name = name.clone();
    let on_rename = move |ev: web_sys::MouseEvent| {
        ev.stop_propagation();
        dialog.open_rename(ItemKind::Folder, id, rename_name.clone());
    };

    let state = app_state.0.clone();
    let on_delete = move |ev: web_sys::MouseEvent| {
        ev.stop_propagation();
        let state = state.clone();
        spawn_local(async move {
            match state.store.delete_folder(id).await {
                Ok(()) => {
                    if state.target_folder_id.get_untracked() == Some(id) {
                        state.target_folder_id.set(None);
                    }
                }
                Err(e) => dialog.error.set(Some(e.message)),
            }
        });
    };

    let chevron = {
        let expanded = expanded.clone();
        move || {
            if expanded() {
                view! { <ChevronDown class="size-4 text-muted-foreground".to_string() /> }.into_any()
            } else {
                view! { <ChevronRight class="size-4 text-muted-foreground".to_string() /> }.into_any()
            }
        }
    };

    view! {
        <div>
            <div class=TREE_ROW_CLASS on:click=on_toggle>
                <span class="flex min-w-0 flex-1 items-center gap-1">
                    {chevron}
                    <svg
                        xmlns="http://www.w3.org/2000/svg"
                        viewBox="0 0 24 24"
                        class="size-4 flex-shrink-0 text-primary"
                        fill="none"
                        stroke="currentColor"
                        stroke-width="2"
                        stroke-linecap="round"
                        stroke-linejoin="round"
                        aria-hidden="true"
                    >
                        <path d="M20 20a2 2 0 0 0 2-2V8a2 2 0 0 0-2-2h-7.9a2 2 0 0 1-1.69-.9L9.6 3.9A2 2 0 0 0 7.93 3H4a2 2 0 0 0-2 2v13a2 2 0 0 0 2 2Z" />
                    </svg>
                    <span class="truncate">{name}</span>
                </span>
                <span class="flex items-center gap-0.5">
                    <button class=ICON_BUTTON_CLASS title="Rename" on:click=on_rename>"Aa"</button>
                    <button class=ICON_BUTTON_CLASS title="Delete" on:click=on_delete>
                        <X class="size-3".to_string() />
                    </button>
                </span>
            </div>
            {move || {
                expanded()
                    .then(|| view! {
                        <div class="ml-4">
                            <FolderChildren parent_id=Some(id) />
                        </div>
                    }.into_any())
            }}
        </div>
    }
    .into_any()
}
