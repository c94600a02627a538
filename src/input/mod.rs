//! Request input resolution and image loading.

mod decode;
mod remote;
mod resolver;

pub use decode::{decode_data_url, load_images};
pub use remote::RemoteImages;
pub use resolver::{
    ImageSource, InputMode, InputResolver, ResolvedInputs, UploadedFile, check_extension,
};
