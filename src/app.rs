//! Application wiring and command dispatch
//!
//! [`App`] owns one instance of every service: the recipe client, the image
//! cache and loader, and the bookmark store. It is constructed once at start
//! and every command runs through it, so all store mutations have a single
//! owner.

use directories::ProjectDirs;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::bookmarks::{sorted_by_name, BookmarkStore};
use crate::cache::{ImageCache, ImageError, ImageLoader, SystemClock};
use crate::cli::{AppConfig, CacheCommand, Command};
use crate::data::{Dessert, MealDbClient, RecipeError};
use crate::storage::{
    FileSettingsStore, ImageRecordStore, KeyValueStore, MemoryImageStore, SqliteImageStore,
};

/// Shown by `bookmarks` when nothing is bookmarked
pub const NO_BOOKMARKS_MESSAGE: &str = "Looks like you don't have any bookmarks yet!\n\n\
     Look up a dessert's id with `list` and run `bookmark <ID>` to save it for later.";

/// File name of the image database inside the cache directory
const IMAGE_DB_FILE: &str = "images.sqlite3";

/// Errors surfaced to the user by application commands
#[derive(Debug, Error)]
pub enum AppError {
    /// No home directory and no `--data-dir`
    #[error("Could not determine a data directory; pass --data-dir")]
    NoDataDir,

    /// The dessert list could not be fetched
    #[error("Unable to load desserts. Please check your network and try again.")]
    DessertList(#[source] RecipeError),

    /// A single recipe could not be fetched or was unusable
    #[error("{}", .0.user_message())]
    Recipe(#[from] RecipeError),

    /// An image could not be loaded
    #[error("Unable to load image: {0}")]
    Image(#[from] ImageError),

    /// The bookmark change could not be saved
    #[error("Could not save bookmark for {0}")]
    BookmarkNotSaved(String),

    /// Writing output failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where the durable stores live on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    pub settings_dir: PathBuf,
    pub image_db: PathBuf,
}

impl StoragePaths {
    /// Uses `data_dir` for everything when given, otherwise the platform
    /// data directory for settings and the cache directory for images
    pub fn resolve(data_dir: Option<&Path>) -> Option<Self> {
        match data_dir {
            Some(dir) => Some(Self {
                settings_dir: dir.join("settings"),
                image_db: dir.join(IMAGE_DB_FILE),
            }),
            None => {
                let project_dirs = ProjectDirs::from("", "", "dessert-cookbook")?;
                Some(Self {
                    settings_dir: project_dirs.data_dir().join("settings"),
                    image_db: project_dirs.cache_dir().join(IMAGE_DB_FILE),
                })
            }
        }
    }
}

/// The running application
pub struct App {
    recipes: MealDbClient,
    loader: ImageLoader,
    images: ImageCache,
    bookmarks: BookmarkStore,
    prefetch_concurrency: usize,
    purged_at_launch: bool,
}

impl App {
    /// Opens the durable stores described by `config` and runs the launch-time
    /// cache refresh
    pub fn open(config: &AppConfig) -> Result<Self, AppError> {
        let paths = StoragePaths::resolve(config.data_dir.as_deref()).ok_or(AppError::NoDataDir)?;

        let settings: Arc<dyn KeyValueStore> =
            Arc::new(FileSettingsStore::with_dir(paths.settings_dir));

        let records: Box<dyn ImageRecordStore> = match SqliteImageStore::open(&paths.image_db) {
            Ok(store) => Box::new(store),
            Err(e) => {
                tracing::warn!(
                    path = %paths.image_db.display(),
                    error = %e,
                    "image cache unavailable, images will not be kept between runs"
                );
                Box::new(MemoryImageStore::new())
            }
        };

        let images = ImageCache::open(
            records,
            settings.clone(),
            Arc::new(SystemClock),
            config.refresh_policy,
        );
        let bookmarks = BookmarkStore::open(settings);

        let mut app = Self::with_services(
            MealDbClient::with_base_url(config.api_base_url.clone(), config.request_timeout),
            ImageLoader::with_timeout(config.image_timeout),
            images,
            bookmarks,
            config.prefetch_concurrency,
        );
        app.launch();
        Ok(app)
    }

    /// Assembles an application from already constructed services
    pub fn with_services(
        recipes: MealDbClient,
        loader: ImageLoader,
        images: ImageCache,
        bookmarks: BookmarkStore,
        prefetch_concurrency: usize,
    ) -> Self {
        Self {
            recipes,
            loader,
            images,
            bookmarks,
            prefetch_concurrency,
            purged_at_launch: false,
        }
    }

    /// Runs the launch-time cache refresh and remembers whether it purged
    pub fn launch(&mut self) -> bool {
        self.purged_at_launch = self.on_foreground();
        self.purged_at_launch
    }

    /// Foreground hook; returns whether the image cache was purged
    pub fn on_foreground(&mut self) -> bool {
        self.images.refresh_if_due()
    }

    pub fn bookmarks(&self) -> &BookmarkStore {
        &self.bookmarks
    }

    pub fn images(&self) -> &ImageCache {
        &self.images
    }

    /// Runs a single command, writing human-readable output to `out`
    pub async fn run<W: Write>(&mut self, command: &Command, out: &mut W) -> Result<(), AppError> {
        match command {
            Command::List { prefetch_images } => self.list(*prefetch_images, out).await,
            Command::Show { id } => self.show(id, out).await,
            Command::Bookmark { id } => self.toggle_bookmark(id, out).await,
            Command::Bookmarks => self.list_bookmarks(out),
            Command::Image { url, output } => self.image(url, output.as_deref(), out).await,
            Command::Cache(CacheCommand::Status) => self.cache_status(out),
            Command::Cache(CacheCommand::Refresh) => self.cache_refresh(out),
        }
    }

    async fn list<W: Write>(&mut self, prefetch_images: bool, out: &mut W) -> Result<(), AppError> {
        let desserts = self
            .recipes
            .fetch_desserts()
            .await
            .map_err(AppError::DessertList)?;

        for dessert in &desserts {
            let marker = if self.bookmarks.is_bookmarked(&dessert.id) {
                '*'
            } else {
                ' '
            };
            writeln!(out, "{} {:<8} {}", marker, dessert.id, dessert.name)?;
        }

        if prefetch_images {
            let urls: Vec<String> = desserts.into_iter().map(|d| d.image_url).collect();
            let summary = self
                .loader
                .prefetch(&mut self.images, &urls, self.prefetch_concurrency)
                .await;
            writeln!(
                out,
                "\nImages: {} already cached, {} downloaded, {} failed",
                summary.cached, summary.fetched, summary.failed
            )?;
        }

        Ok(())
    }

    async fn show<W: Write>(&mut self, id: &str, out: &mut W) -> Result<(), AppError> {
        let dessert = self.recipes.fetch_dessert(id).await.map_err(|e| {
            tracing::debug!(id, error = %e, "recipe fetch failed");
            AppError::Recipe(e)
        })?;

        write_recipe(out, &dessert, self.bookmarks.is_bookmarked(&dessert.id))?;
        Ok(())
    }

    async fn toggle_bookmark<W: Write>(&mut self, id: &str, out: &mut W) -> Result<(), AppError> {
        let was_bookmarked = self.bookmarks.is_bookmarked(id);

        // Removing uses the stored snapshot so it works offline
        let dessert = match self.bookmarks.current().remove(id) {
            Some(snapshot) => snapshot,
            None => self.recipes.fetch_dessert(id).await?,
        };

        let bookmarked = self.bookmarks.toggle(&dessert);
        if bookmarked == was_bookmarked {
            return Err(AppError::BookmarkNotSaved(dessert.name));
        }

        if bookmarked {
            writeln!(out, "Bookmarked {}", dessert.name)?;
        } else {
            writeln!(out, "Removed bookmark for {}", dessert.name)?;
        }
        Ok(())
    }

    fn list_bookmarks<W: Write>(&self, out: &mut W) -> Result<(), AppError> {
        let desserts = sorted_by_name(&self.bookmarks.current());
        if desserts.is_empty() {
            writeln!(out, "{}", NO_BOOKMARKS_MESSAGE)?;
            return Ok(());
        }

        for dessert in &desserts {
            match &dessert.origin {
                Some(origin) => writeln!(out, "{:<8} {} ({})", dessert.id, dessert.name, origin)?,
                None => writeln!(out, "{:<8} {}", dessert.id, dessert.name)?,
            }
        }
        Ok(())
    }

    async fn image<W: Write>(
        &mut self,
        url: &str,
        output: Option<&Path>,
        out: &mut W,
    ) -> Result<(), AppError> {
        let data = self.loader.load(&mut self.images, url).await?;

        match output {
            Some(path) => {
                fs::write(path, &data)?;
                writeln!(out, "Saved {} bytes to {}", data.len(), path.display())?;
            }
            None => writeln!(out, "{} bytes", data.len())?,
        }
        Ok(())
    }

    fn cache_status<W: Write>(&self, out: &mut W) -> Result<(), AppError> {
        writeln!(out, "Cached images: {}", self.images.len())?;
        writeln!(
            out,
            "Last refresh: {}",
            self.images.last_refresh().format("%Y-%m-%d %H:%M")
        )?;
        writeln!(out, "Refresh day: {}", self.images.policy().refresh_day())?;
        Ok(())
    }

    fn cache_refresh<W: Write>(&mut self, out: &mut W) -> Result<(), AppError> {
        if self.on_foreground() {
            writeln!(out, "Image cache flushed")?;
        } else if self.purged_at_launch {
            writeln!(out, "Image cache flushed at launch")?;
        } else {
            writeln!(
                out,
                "Image cache refresh not due (flushes once every {})",
                self.images.policy().refresh_day()
            )?;
        }
        Ok(())
    }
}

/// Writes a recipe in a plain-text layout
fn write_recipe<W: Write>(out: &mut W, dessert: &Dessert, bookmarked: bool) -> std::io::Result<()> {
    let marker = if bookmarked { " [bookmarked]" } else { "" };
    writeln!(out, "{}{}", dessert.name, marker)?;
    if let Some(origin) = &dessert.origin {
        writeln!(out, "Origin: {}", origin)?;
    }

    writeln!(out, "\nIngredients")?;
    for ingredient in &dessert.ingredients {
        writeln!(out, "  - {} ({})", ingredient.name, ingredient.measurement)?;
    }

    if let Some(instructions) = &dessert.instructions {
        writeln!(out, "\nInstructions\n{}", instructions)?;
    }
    Ok(())
}
