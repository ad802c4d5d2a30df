//! # Catalog Repository
//!
//! Reads and writes for the replicated reference data: products,
//! categories, customers, expense categories. The replicator fills these
//! tables from the remote store; the billing pipeline only reads them
//! (item enrichment, customer joins). The insert methods exist for
//! seeding and tests.

use sqlx::SqlitePool;

use crate::error::DbResult;
use ledger_core::{Category, Customer, ExpenseCategory, Product};

const PRODUCT_COLUMNS: &str =
    "id, name, category_id, price_cents, tax_rate_bps, unit, is_active, created_at";

const CUSTOMER_COLUMNS: &str = "id, name, phone, email, address, created_at";

/// Repository for reference data.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    /// Creates a new CatalogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// Gets a product by id.
    pub async fn get_product(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Searches active products by name substring (bound LIKE pattern).
    pub async fn search_products(&self, query: &str, limit: u32) -> DbResult<Vec<Product>> {
        let pattern = format!("%{}%", query.trim());

        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE is_active = 1 AND name LIKE ?1 \
             ORDER BY name LIMIT ?2"
        ))
        .bind(pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Inserts a product (seeding/tests).
    pub async fn insert_product(&self, product: &Product) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO products \
             (id, name, category_id, price_cents, tax_rate_bps, unit, is_active, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.category_id)
        .bind(product.price_cents)
        .bind(product.tax_rate_bps)
        .bind(&product.unit)
        .bind(product.is_active)
        .bind(product.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // =========================================================================
    // Categories
    // =========================================================================

    /// Lists all product categories.
    pub async fn list_categories(&self) -> DbResult<Vec<Category>> {
        let categories =
            sqlx::query_as::<_, Category>("SELECT id, name FROM categories ORDER BY name")
                .fetch_all(&self.pool)
                .await?;

        Ok(categories)
    }

    /// Inserts a category (seeding/tests).
    pub async fn insert_category(&self, category: &Category) -> DbResult<()> {
        sqlx::query("INSERT INTO categories (id, name) VALUES (?1, ?2)")
            .bind(&category.id)
            .bind(&category.name)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // =========================================================================
    // Customers
    // =========================================================================

    /// Gets a customer by id.
    pub async fn get_customer(&self, id: &str) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(customer)
    }

    /// Searches customers by name or phone substring.
    pub async fn search_customers(&self, query: &str, limit: u32) -> DbResult<Vec<Customer>> {
        let pattern = format!("%{}%", query.trim());

        let customers = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers \
             WHERE name LIKE ?1 OR phone LIKE ?1 \
             ORDER BY name LIMIT ?2"
        ))
        .bind(pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(customers)
    }

    /// Inserts a customer (seeding/tests).
    pub async fn insert_customer(&self, customer: &Customer) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO customers (id, name, phone, email, address, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(&customer.email)
        .bind(&customer.address)
        .bind(customer.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // =========================================================================
    // Expense categories
    // =========================================================================

    /// Lists all expense categories.
    pub async fn list_expense_categories(&self) -> DbResult<Vec<ExpenseCategory>> {
        let categories = sqlx::query_as::<_, ExpenseCategory>(
            "SELECT id, name FROM expense_categories ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    /// Inserts an expense category (seeding/tests).
    pub async fn insert_expense_category(&self, category: &ExpenseCategory) -> DbResult<()> {
        sqlx::query("INSERT INTO expense_categories (id, name) VALUES (?1, ?2)")
            .bind(&category.id)
            .bind(&category.name)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
