use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        orders::{
            AddItemRequest, AddItemResponse, CreateOrderRequest, CreateOrderResponse, NewOrderItem,
            OrderList, OrderWithItems, TotalPriceQuery, TotalPriceResponse, UpdateOrderRequest,
        },
        products::{AddImageRequest, CreateProductRequest, ImageList, ProductList, UpdateProductRequest},
        users::{CreateUserRequest, UpdateUserRequest, UserList},
    },
    models::{Order, OrderItem, Product, ProductImage, User},
    response::{ApiResponse, Meta},
    routes::{health, orders, params, products, users},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        orders::list_orders,
        orders::create_order,
        orders::get_order,
        orders::update_order,
        orders::delete_order,
        orders::add_order_item,
        orders::remove_order_item,
        orders::total_price,
        products::list_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        products::list_images,
        products::add_image,
        products::remove_image,
        users::list_users,
        users::get_user,
        users::create_user,
        users::update_user,
        users::delete_user
    ),
    components(
        schemas(
            User,
            Product,
            ProductImage,
            Order,
            OrderItem,
            NewOrderItem,
            CreateOrderRequest,
            CreateOrderResponse,
            AddItemRequest,
            AddItemResponse,
            UpdateOrderRequest,
            OrderWithItems,
            OrderList,
            TotalPriceQuery,
            TotalPriceResponse,
            CreateProductRequest,
            UpdateProductRequest,
            ProductList,
            AddImageRequest,
            ImageList,
            CreateUserRequest,
            UpdateUserRequest,
            UserList,
            params::Pagination,
            params::OrderListQuery,
            params::ProductQuery,
            params::UserListQuery,
            Meta,
            ApiResponse<Order>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<UserList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Orders", description = "Order ledger endpoints"),
        (name = "Products", description = "Product catalog endpoints"),
        (name = "Users", description = "User administration endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
