use crate::state::SaveStatus;
use icons::{Check, Loader, X};
use leptos::prelude::*;
use leptos_ui::clx;
use tw_merge::tw_merge;

pub(crate) const BUTTON_CLASS: &str = "inline-flex h-8 items-center justify-center gap-1.5 rounded-md border px-3 text-sm font-medium shadow-xs hover:bg-accent hover:text-accent-foreground disabled:pointer-events-none disabled:opacity-50";
pub(crate) const PRIMARY_BUTTON_CLASS: &str = "inline-flex h-8 items-center justify-center gap-1.5 rounded-md bg-primary px-3 text-sm font-medium text-primary-foreground shadow-xs hover:bg-primary/90 disabled:pointer-events-none disabled:opacity-50";
pub(crate) const ICON_BUTTON_CLASS: &str = "inline-flex size-6 items-center justify-center rounded-md text-muted-foreground opacity-0 group-hover:opacity-100 hover:bg-accent hover:text-foreground";
pub(crate) const TREE_ROW_CLASS: &str = "group flex items-center justify-between rounded px-2 py-1 text-sm cursor-pointer hover:bg-accent";
pub(crate) const INPUT_CLASS: &str = "border-input flex h-9 w-full min-w-0 rounded-md border bg-transparent px-3 py-1 text-sm shadow-xs outline-none focus-visible:border-ring focus-visible:ring-2 focus-visible:ring-ring/50";

mod styled {
    use super::*;
    clx! {Panel, div, "h-full border-r bg-background"}
    clx! {PanelHeader, div, "border-b p-4"}
    clx! {Banner, div, "rounded-md border border-destructive/30 px-3 py-2 text-xs text-destructive"}
}

pub(crate) use styled::*;

#[component]
pub fn Spinner(#[prop(into, optional)] class: String) -> impl IntoView {
    let merged_class = tw_merge!("size-4 animate-spin", class);

    view! { <Loader class=merged_class attr:role="status" attr:aria-label="Saving" /> }
}

/// Editor header badge for the autosave state.
#[component]
pub fn SaveIndicator(
    #[prop(into)] status: Signal<SaveStatus>,
    #[prop(into, optional)] class: String,
) -> impl IntoView {
    let merged_class = tw_merge!(
        "inline-flex items-center gap-1.5 text-xs text-muted-foreground",
        class
    );

    view! {
        <span class=merged_class>
            {move || match status.get() {
                SaveStatus::Idle => ().into_any(),
                SaveStatus::Pending => view! { <span>"Unsaved changes"</span> }.into_any(),
                SaveStatus::Saving => {
                    view! {
                        <Spinner class="size-3" />
                        <span>"Saving..."</span>
                    }
                        .into_any()
                }
                SaveStatus::Saved => {
                    view! {
                        <Check class="size-3".to_string() />
                        <span>"Saved"</span>
                    }
                        .into_any()
                }
                SaveStatus::Failed(message) => {
                    view! {
                        <X class="size-3 text-destructive".to_string() />
                        <span class="text-destructive" title=message>"Not saved"</span>
                    }
                        .into_any()
                }
            }}
        </span>
    }
}
