//! Admin page routes, relative to the mount prefix.

use crate::handlers::{
    add_collection_form, add_item, add_item_form, delete_collection, delete_collection_form, delete_item,
    delete_item_form, drop_collection, edit_fields, edit_fields_form, edit_raw, edit_raw_form, edit_schema,
    edit_schema_form, login_form, login_submit, logout, modify_collection_form, save_collection, view_all,
    view_collection,
};
use crate::state::AppState;
use axum::{routing::get, routing::post, Router};

/// `POST /drop/:coll` is only routed when direct drop is enabled.
pub fn admin_routes(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/", get(view_all))
        .route("/login", get(login_form).post(login_submit))
        .route("/logout", get(logout))
        .route("/view/:coll", get(view_collection))
        .route("/edit/:coll/:id", get(edit_fields_form).post(edit_fields))
        .route("/edit_schema/:coll/:id", get(edit_schema_form).post(edit_schema))
        .route("/edit_raw/:coll/:id", get(edit_raw_form).post(edit_raw))
        .route("/delete/:coll", get(delete_collection_form).post(delete_collection))
        .route("/delete/:coll/:id", get(delete_item_form).post(delete_item))
        .route("/add", get(add_collection_form).post(save_collection))
        .route("/add/:coll", get(add_item_form).post(add_item))
        .route("/modify/:coll", get(modify_collection_form).post(save_collection));
    if state.admin.allows_direct_drop() {
        router = router.route("/drop/:coll", post(drop_collection));
    }
    router.with_state(state)
}
