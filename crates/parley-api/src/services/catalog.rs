use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use parley_db::Database;
use parley_types::models::{MAX_PRODUCT_NAME_LEN, Product};

use crate::error::ApiError;

pub fn create_product(db: &Database, name: &str, price: Decimal) -> Result<Product, ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::validation("Product name is required"));
    }
    if name.chars().count() > MAX_PRODUCT_NAME_LEN {
        return Err(ApiError::validation(format!(
            "Product name must be at most {} characters",
            MAX_PRODUCT_NAME_LEN
        )));
    }

    let product = Product {
        id: Uuid::new_v4(),
        name: name.to_string(),
        price,
    };

    if db.get_product_by_id(product.id)?.is_some() {
        return Err(ApiError::Duplicate(format!(
            "Product with id: {} already exists",
            product.id
        )));
    }
    if db.get_product_by_name(&product.name)?.is_some() {
        warn!("Refusing duplicate product name '{}'", product.name);
        return Err(ApiError::Duplicate(format!(
            "Product with name: {} already exists",
            product.name
        )));
    }
    if price <= Decimal::ZERO {
        return Err(ApiError::validation("Price must be greater than zero"));
    }

    db.insert_product(&product)
        .map_err(|e| duplicate_or_internal(e, &product.name))?;
    info!("Product {} '{}' created at {}", product.id, product.name, product.price);
    Ok(product)
}

/// A concurrent insert can still win the race past the checks above.
fn duplicate_or_internal(err: anyhow::Error, name: &str) -> ApiError {
    if parley_db::is_unique_violation(&err) {
        ApiError::Duplicate(format!("Product with name: {} already exists", name))
    } else {
        ApiError::Internal(err)
    }
}

pub fn get_product_by_id(db: &Database, id: Uuid) -> Result<Product, ApiError> {
    db.get_product_by_id(id)?
        .ok_or_else(|| ApiError::not_found(format!("Product with id: {} does not exist", id)))
}

pub fn get_product_by_name(db: &Database, name: &str) -> Result<Product, ApiError> {
    db.get_product_by_name(name)?
        .ok_or_else(|| ApiError::not_found(format!("Product with name: {} does not exist", name)))
}

pub fn list_products(db: &Database) -> Result<Vec<Product>, ApiError> {
    Ok(db.list_products()?)
}

pub fn delete_product(db: &Database, id: Uuid) -> Result<(), ApiError> {
    if !db.delete_product(id)? {
        return Err(ApiError::not_found(format!(
            "Product with id: {} does not exist",
            id
        )));
    }
    info!("Product {} deleted", id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn create_then_fetch_by_name() {
        let db = db();
        let created = create_product(&db, "Standing desk", Decimal::new(45_000, 2)).unwrap();

        let fetched = get_product_by_name(&db, "Standing desk").unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.price, Decimal::new(45_000, 2));
        assert_eq!(get_product_by_id(&db, created.id).unwrap(), created);
    }

    #[test]
    fn same_name_twice_is_duplicate() {
        let db = db();
        create_product(&db, "Monitor", Decimal::new(199, 0)).unwrap();

        let err = create_product(&db, "Monitor", Decimal::new(150, 0)).unwrap_err();
        assert!(matches!(err, ApiError::Duplicate(_)), "got {:?}", err);
        assert_eq!(list_products(&db).unwrap().len(), 1);
    }

    #[test]
    fn insert_constraint_failure_maps_to_duplicate() {
        let db = db();
        let first = create_product(&db, "Bookshelf", Decimal::new(80, 0)).unwrap();

        let racing = Product {
            id: Uuid::new_v4(),
            ..first
        };
        let err = db.insert_product(&racing).unwrap_err();
        let err = duplicate_or_internal(err, &racing.name);
        assert!(matches!(err, ApiError::Duplicate(_)), "got {:?}", err);

        let other = duplicate_or_internal(anyhow::anyhow!("disk full"), "Bookshelf");
        assert!(matches!(other, ApiError::Internal(_)));
    }

    #[test]
    fn non_positive_price_is_rejected() {
        let db = db();
        for price in [Decimal::ZERO, Decimal::new(-1, 0)] {
            let err = create_product(&db, "Free lunch", price).unwrap_err();
            assert!(matches!(err, ApiError::Validation(_)), "got {:?}", err);
        }
        assert!(list_products(&db).unwrap().is_empty());
    }

    #[test]
    fn name_length_is_bounded() {
        let db = db();
        let long = "x".repeat(MAX_PRODUCT_NAME_LEN + 1);
        assert!(matches!(
            create_product(&db, &long, Decimal::ONE),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            create_product(&db, "   ", Decimal::ONE),
            Err(ApiError::Validation(_))
        ));

        let exact = "y".repeat(MAX_PRODUCT_NAME_LEN);
        assert!(create_product(&db, &exact, Decimal::ONE).is_ok());
    }

    #[test]
    fn delete_missing_product_is_not_found() {
        let db = db();
        let created = create_product(&db, "Lamp", Decimal::new(20, 0)).unwrap();

        delete_product(&db, created.id).unwrap();
        assert!(matches!(
            delete_product(&db, created.id),
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            get_product_by_id(&db, created.id),
            Err(ApiError::NotFound(_))
        ));
    }
}
