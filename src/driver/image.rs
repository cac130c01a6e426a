//! In-memory image display driver

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use super::{DisplayDriver, DriverError, DriverFactory, Result, invalid_parameter, validate_format};
use crate::data::Box2i;
use crate::protocol::OpenParameters;

/// Factory name of [`ImageDisplayDriver`]
pub const IMAGE_DRIVER_TYPE: &str = "ImageDisplayDriver";

/// Open parameter naming the [`ImageStore`] slot a finished image goes to
pub const HANDLE_PARAMETER: &str = "handle";

const DEFAULT_HANDLE: &str = "default";

/// Largest number of floats, over all channels, one [`Image`] may hold
pub const MAX_IMAGE_VALUES: usize = 1 << 28;

/// Float image with one plane per channel covering the data window
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Image {
    display_window: Box2i,
    data_window: Box2i,
    channel_names: Vec<String>,
    planes: Vec<Vec<f32>>,
}

impl Image {
    /// Black image over `data_window`
    ///
    /// Fails with [`DriverError::InvalidFormat`] when the planes would hold
    /// more than [`MAX_IMAGE_VALUES`] floats or cannot be allocated.
    pub fn new(
        display_window: Box2i,
        data_window: Box2i,
        channel_names: Vec<String>,
    ) -> Result<Self> {
        let area = data_window
            .checked_area()
            .filter(|area| {
                area.checked_mul(channel_names.len())
                    .is_some_and(|values| values <= MAX_IMAGE_VALUES)
            })
            .ok_or_else(|| {
                DriverError::InvalidFormat(format!(
                    "data window {data_window:?} with {} channels is too large",
                    channel_names.len()
                ))
            })?;

        let mut planes = Vec::with_capacity(channel_names.len());
        for _ in &channel_names {
            let mut plane = Vec::new();
            plane.try_reserve_exact(area).map_err(|err| {
                DriverError::InvalidFormat(format!("cannot allocate {area} pixels: {err}"))
            })?;
            plane.resize(area, 0.0);
            planes.push(plane);
        }

        Ok(Self {
            display_window,
            data_window,
            channel_names,
            planes,
        })
    }

    /// Full image window
    #[must_use]
    pub fn display_window(&self) -> Box2i {
        self.display_window
    }

    /// Window the planes cover
    #[must_use]
    pub fn data_window(&self) -> Box2i {
        self.data_window
    }

    /// Channel names in plane order
    #[must_use]
    pub fn channel_names(&self) -> &[String] {
        &self.channel_names
    }

    /// Plane of the named channel, in scan-line order
    #[must_use]
    pub fn channel(&self, name: &str) -> Option<&[f32]> {
        self.channel_names
            .iter()
            .position(|channel| channel == name)
            .map(|index| self.planes[index].as_slice())
    }

    /// Value of one channel at absolute pixel coordinates
    #[must_use]
    pub fn pixel(&self, name: &str, x: i32, y: i32) -> Option<f32> {
        let index = self.offset(x, y)?;
        self.channel(name).map(|plane| plane[index])
    }

    fn offset(&self, x: i32, y: i32) -> Option<usize> {
        let pixel = Box2i::from_coords(x, y, x, y);
        if !self.data_window.contains(&pixel) {
            return None;
        }
        let min = self.data_window.min();
        let column = usize::try_from(i64::from(x) - i64::from(min.x())).ok()?;
        let row = usize::try_from(i64::from(y) - i64::from(min.y())).ok()?;
        Some(row * self.data_window.width() + column)
    }

    /// Copy an interleaved region into the planes
    fn write_region(&mut self, region: &Box2i, data: &[f32]) -> Result<()> {
        if !self.data_window.contains(region) {
            return Err(DriverError::RegionOutsideDataWindow {
                region: *region,
                data_window: self.data_window,
            });
        }

        let channels = self.planes.len();
        let expected = region.area() * channels;
        if data.len() != expected {
            return Err(DriverError::BufferSize {
                expected,
                found: data.len(),
            });
        }

        let width = region.width();
        let min = region.min();
        for (row, pixels) in data.chunks_exact(width * channels).enumerate() {
            // region lies inside the data window, so every offset exists
            let Some(start) = i32::try_from(row)
                .ok()
                .and_then(|row| min.y().checked_add(row))
                .and_then(|y| self.offset(min.x(), y))
            else {
                continue;
            };
            for (column, values) in pixels.chunks_exact(channels).enumerate() {
                for (plane, value) in self.planes.iter_mut().zip(values) {
                    plane[start + column] = *value;
                }
            }
        }
        Ok(())
    }
}

/// Shared slots receiving finished images by handle
#[derive(Debug, Clone, Default)]
pub struct ImageStore {
    images: Arc<Mutex<HashMap<String, Image>>>,
}

impl ImageStore {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Image>> {
        self.images.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `image` under `handle`, replacing any previous image
    pub fn insert(&self, handle: impl Into<String>, image: Image) {
        self.lock().insert(handle.into(), image);
    }

    /// Copy of the image stored under `handle`
    #[must_use]
    pub fn get(&self, handle: &str) -> Option<Image> {
        self.lock().get(handle).cloned()
    }

    /// Remove and return the image stored under `handle`
    pub fn take(&self, handle: &str) -> Option<Image> {
        self.lock().remove(handle)
    }

    /// Stored handles, sorted
    #[must_use]
    pub fn handles(&self) -> Vec<String> {
        let mut handles: Vec<_> = self.lock().keys().cloned().collect();
        handles.sort_unstable();
        handles
    }

    /// Number of stored images
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no image is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Register [`ImageDisplayDriver`] under [`IMAGE_DRIVER_TYPE`],
    /// publishing into this store
    pub fn register_driver(&self, factory: &mut DriverFactory) {
        let store = self.clone();
        factory.register(IMAGE_DRIVER_TYPE, move |open| {
            Ok(Box::new(ImageDisplayDriver::new(open, store.clone())?))
        });
    }
}

/// Driver assembling regions into an [`Image`] and publishing it to an
/// [`ImageStore`] on close
#[derive(Debug)]
pub struct ImageDisplayDriver {
    image: Image,
    handle: String,
    store: ImageStore,
    closed: bool,
}

impl ImageDisplayDriver {
    /// Driver for the image described by `open`
    pub fn new(open: &OpenParameters, store: ImageStore) -> Result<Self> {
        validate_format(open)?;

        let handle = match open.parameters.get(HANDLE_PARAMETER) {
            None => DEFAULT_HANDLE,
            Some(value) => value
                .as_str()
                .ok_or_else(|| invalid_parameter(HANDLE_PARAMETER, "expected a string"))?,
        };

        debug!(
            handle,
            channels = open.channel_names.len(),
            width = open.data_window.width(),
            height = open.data_window.height(),
            "image opened"
        );

        Ok(Self {
            image: Image::new(
                open.display_window,
                open.data_window,
                open.channel_names.clone(),
            )?,
            handle: handle.to_string(),
            store,
            closed: false,
        })
    }

    /// Image assembled so far
    #[must_use]
    pub fn image(&self) -> &Image {
        &self.image
    }
}

impl DisplayDriver for ImageDisplayDriver {
    fn scan_line_order_only(&self) -> bool {
        false
    }

    fn accepts_repeated_data(&self) -> bool {
        true
    }

    fn image_data(&mut self, region: &Box2i, data: &[f32]) -> Result<()> {
        if self.closed {
            return Err(DriverError::Closed);
        }
        self.image.write_region(region, data)
    }

    fn image_close(&mut self) -> Result<()> {
        if self.closed {
            return Err(DriverError::Closed);
        }
        self.closed = true;
        info!(handle = %self.handle, "image complete");
        self.store
            .insert(self.handle.clone(), std::mem::take(&mut self.image));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CompoundMap, Data};

    fn open(handle: Option<Data>) -> OpenParameters {
        let mut parameters = CompoundMap::new();
        if let Some(handle) = handle {
            parameters.insert(HANDLE_PARAMETER.into(), handle);
        }
        OpenParameters {
            display_window: Box2i::from_coords(0, 0, 9, 9),
            data_window: Box2i::from_coords(2, 2, 5, 4),
            channel_names: vec!["R".into(), "G".into()],
            parameters,
        }
    }

    #[test]
    fn test_region_lands_at_offset() {
        let store = ImageStore::new();
        let mut driver = ImageDisplayDriver::new(&open(Some(Data::from("beauty"))), store.clone())
            .unwrap();

        // 2x1 region at (3, 3), interleaved RG
        let region = Box2i::from_coords(3, 3, 4, 3);
        driver.image_data(&region, &[1.0, 10.0, 2.0, 20.0]).unwrap();

        let image = driver.image();
        assert_eq!(image.pixel("R", 3, 3), Some(1.0));
        assert_eq!(image.pixel("G", 3, 3), Some(10.0));
        assert_eq!(image.pixel("R", 4, 3), Some(2.0));
        assert_eq!(image.pixel("G", 4, 3), Some(20.0));
        assert_eq!(image.pixel("R", 2, 2), Some(0.0));
        assert_eq!(image.pixel("R", 0, 0), None);
        assert_eq!(image.channel("R").unwrap()[5], 1.0);

        driver.image_close().unwrap();
        assert_eq!(store.handles(), vec!["beauty".to_string()]);
        assert_eq!(store.get("beauty").unwrap().pixel("G", 4, 3), Some(20.0));
    }

    #[test]
    fn test_full_window_scanlines() {
        let store = ImageStore::new();
        let mut driver = ImageDisplayDriver::new(&open(None), store.clone()).unwrap();
        for y in 2..=4 {
            let line: Vec<f32> = (2..=5).flat_map(|x| [x as f32, y as f32]).collect();
            driver
                .image_data(&Box2i::from_coords(2, y, 5, y), &line)
                .unwrap();
        }
        driver.image_close().unwrap();

        let image = store.take(DEFAULT_HANDLE).unwrap();
        assert_eq!(image.pixel("R", 5, 4), Some(5.0));
        assert_eq!(image.pixel("G", 5, 4), Some(4.0));
        assert!(store.is_empty());
    }

    #[test]
    fn test_region_outside_data_window() {
        let mut driver = ImageDisplayDriver::new(&open(None), ImageStore::new()).unwrap();
        let err = driver
            .image_data(&Box2i::from_coords(0, 0, 1, 1), &[0.0; 8])
            .unwrap_err();
        assert!(matches!(err, DriverError::RegionOutsideDataWindow { .. }));
    }

    #[test]
    fn test_buffer_size_mismatch() {
        let mut driver = ImageDisplayDriver::new(&open(None), ImageStore::new()).unwrap();
        let err = driver
            .image_data(&Box2i::from_coords(2, 2, 3, 2), &[0.0; 3])
            .unwrap_err();
        assert!(matches!(
            err,
            DriverError::BufferSize {
                expected: 4,
                found: 3
            }
        ));
    }

    #[test]
    fn test_closed_driver_rejects_data() {
        let mut driver = ImageDisplayDriver::new(&open(None), ImageStore::new()).unwrap();
        driver.image_close().unwrap();
        assert!(matches!(driver.image_close(), Err(DriverError::Closed)));
        assert!(matches!(
            driver.image_data(&Box2i::from_coords(2, 2, 2, 2), &[0.0, 0.0]),
            Err(DriverError::Closed)
        ));
    }

    #[test]
    fn test_invalid_open_parameters() {
        let err = ImageDisplayDriver::new(&open(Some(Data::from(7i32))), ImageStore::new())
            .unwrap_err();
        assert!(matches!(err, DriverError::InvalidParameter { .. }));

        let mut no_channels = open(None);
        no_channels.channel_names.clear();
        assert!(matches!(
            ImageDisplayDriver::new(&no_channels, ImageStore::new()),
            Err(DriverError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_oversized_data_window_is_rejected() {
        let mut huge = open(None);
        huge.data_window = Box2i::from_coords(0, 0, i32::MAX - 1, i32::MAX - 1);
        assert!(matches!(
            ImageDisplayDriver::new(&huge, ImageStore::new()),
            Err(DriverError::InvalidFormat(_))
        ));

        huge.data_window = Box2i::from_coords(i32::MIN, i32::MIN, i32::MAX, i32::MAX);
        assert!(matches!(
            ImageDisplayDriver::new(&huge, ImageStore::new()),
            Err(DriverError::InvalidFormat(_))
        ));

        // representable, but over the value limit once multiplied by channels
        huge.data_window = Box2i::from_coords(0, 0, 99_999, 99_999);
        let err = ImageDisplayDriver::new(&huge, ImageStore::new()).unwrap_err();
        assert!(err.to_string().contains("too large"));
    }

    #[test]
    fn test_image_at_value_limit_boundary() {
        let window = Box2i::from_coords(0, 0, 1023, 1023);
        let image = Image::new(window, window, vec!["Y".into()]).unwrap();
        assert_eq!(image.channel("Y").unwrap().len(), 1 << 20);

        let channels = vec!["Y".to_string(); (MAX_IMAGE_VALUES >> 20) + 1];
        assert!(Image::new(window, window, channels).is_err());
    }

    #[test]
    fn test_registered_in_factory() {
        let store = ImageStore::new();
        let mut factory = DriverFactory::new();
        store.register_driver(&mut factory);
        factory.set_default(IMAGE_DRIVER_TYPE);

        let mut driver = factory.create(&open(None)).unwrap();
        assert!(!driver.scan_line_order_only());
        assert!(driver.accepts_repeated_data());
        driver.image_close().unwrap();
        assert_eq!(store.len(), 1);
    }
}
