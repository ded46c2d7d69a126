mod category;
mod favorite;
mod recipe;

pub use category::{Category, RecipeSummary};
pub use favorite::{FavoriteRecord, FavoritesSnapshot};
pub use recipe::{Ingredient, Recipe};
