//! Option validation.

use crate::config::schema::{OptionGroups, OptionValue};
use crate::constants::image_size;
use crate::error::ValidationError;

type Validation = std::result::Result<(), ValidationError>;

/// Validate every option and the cross-option constraints.
///
/// Constraints that reference an option missing from the schema are skipped.
pub fn validate_options(groups: &OptionGroups) -> Validation {
    for (group, options) in groups {
        for (key, option) in options {
            option.check(group, key, &option.value)?;
        }
    }

    validate_training(groups)?;
    validate_model(groups)?;
    validate_dataset(groups)?;
    validate_testing(groups)?;
    Ok(())
}

fn value<'a>(groups: &'a OptionGroups, group: &str, key: &str) -> Option<&'a OptionValue> {
    groups.get(group)?.get(key).map(|option| &option.value)
}

fn int(groups: &OptionGroups, group: &str, key: &str) -> Option<i64> {
    match value(groups, group, key)? {
        OptionValue::Int(i) => Some(*i),
        _ => None,
    }
}

fn float(groups: &OptionGroups, group: &str, key: &str) -> Option<f64> {
    match value(groups, group, key)? {
        OptionValue::Float(f) => Some(*f),
        _ => None,
    }
}

fn at_least(groups: &OptionGroups, group: &str, key: &str, min: i64) -> Validation {
    match int(groups, group, key) {
        Some(v) if v < min => Err(ValidationError::new(
            group,
            key,
            format!("must be at least {min}, got {v}"),
        )),
        _ => Ok(()),
    }
}

fn fraction(groups: &OptionGroups, group: &str, key: &str) -> Validation {
    match float(groups, group, key) {
        Some(v) if !(0.0..=1.0).contains(&v) => Err(ValidationError::new(
            group,
            key,
            format!("must be between 0 and 1, got {v}"),
        )),
        _ => Ok(()),
    }
}

fn validate_training(groups: &OptionGroups) -> Validation {
    at_least(groups, "training", "epochs", 1)?;
    at_least(groups, "training", "batch_size", 1)?;

    if let Some(freq) = float(groups, "training", "ckpt_freq")
        && !(freq > 0.0 && freq <= 1.0)
    {
        return Err(ValidationError::new(
            "training",
            "ckpt_freq",
            format!("must be in (0, 1], got {freq}"),
        ));
    }
    Ok(())
}

/// Smallest input side the backbone accepts.
pub fn min_image_size(modelname: &str) -> i64 {
    match modelname {
        "Xception" => image_size::XCEPTION_MIN,
        "InceptionV3" | "InceptionResNetV2" => image_size::INCEPTION_V3_MIN,
        _ => image_size::DEFAULT_MIN,
    }
}

fn validate_model(groups: &OptionGroups) -> Validation {
    let Some(size) = int(groups, "model", "image_size") else {
        return Ok(());
    };
    let min = match value(groups, "model", "modelname") {
        Some(OptionValue::Str(name)) => min_image_size(name),
        _ => image_size::DEFAULT_MIN,
    };
    if size < min {
        return Err(ValidationError::new(
            "model",
            "image_size",
            format!("must be at least {min} for the selected architecture, got {size}"),
        ));
    }
    Ok(())
}

fn validate_dataset(groups: &OptionGroups) -> Validation {
    for key in ["mean_RGB", "std_RGB"] {
        if let Some(OptionValue::List(items)) = value(groups, "dataset", key)
            && items.len() != 3
        {
            return Err(ValidationError::new(
                "dataset",
                key,
                format!("needs one value per RGB channel, got {}", items.len()),
            ));
        }
    }

    if let Some(OptionValue::List(items)) = value(groups, "dataset", "std_RGB")
        && items
            .iter()
            .any(|item| !matches!(item, OptionValue::Float(f) if *f > 0.0))
    {
        return Err(ValidationError::new(
            "dataset",
            "std_RGB",
            "every channel must be positive",
        ));
    }

    fraction(groups, "dataset", "val_fraction")?;
    fraction(groups, "augmentation", "h_flip")?;
    fraction(groups, "augmentation", "crop")
}

fn validate_testing(groups: &OptionGroups) -> Validation {
    at_least(groups, "testing", "top_k", 1)?;

    if let Some(OptionValue::Str(name)) = value(groups, "testing", "ckpt_name")
        && name.trim().is_empty()
    {
        return Err(ValidationError::new(
            "testing",
            "ckpt_name",
            "must not be empty",
        ));
    }
    Ok(())
}
