//! Full marketplace lifecycle against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then drives every `ApiClient`
//! build/parse operation over real HTTP using ureq as the host. Validates
//! that request building and response parsing work end-to-end with the
//! actual server.

use std::io::Read;

use market_client::{
    ApiClient, ApiError, CreateProduct, CurrentUser, FileUpload, FormPart, HttpMethod, HttpRequest, HttpResponse,
    MultipartForm, Params, Product, Reply, RequestBody, UpdateProduct, UploadReceipt,
};
use serde_json::{json, Value};

fn with_headers<B>(mut builder: ureq::RequestBuilder<B>, headers: &[(String, String)]) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

/// Encode a form with reqwest's blocking multipart writer, returning the
/// `Content-Type` value (with its boundary) and the body bytes.
fn encode_form(form: MultipartForm) -> (String, Vec<u8>) {
    let mut out = reqwest::blocking::multipart::Form::new();
    for part in form.into_parts() {
        out = match part {
            FormPart::Text { name, value } => out.text(name, value),
            FormPart::File { name, file } => {
                let part = reqwest::blocking::multipart::Part::bytes(file.data)
                    .file_name(file.filename)
                    .mime_str(&file.content_type)
                    .expect("valid part content type");
                out.part(name, part)
            }
        };
    }
    let content_type = format!("multipart/form-data; boundary={}", out.boundary());
    let mut body = Vec::new();
    out.into_reader().read_to_end(&mut body).expect("multipart body");
    (content_type, body)
}

/// Execute an `HttpRequest` using ureq and return an `HttpResponse`.
///
/// Disables ureq's automatic status-code-as-error behavior so 4xx/5xx
/// responses are returned as data rather than `Err`, letting the client
/// handle status interpretation. The client leaves multipart encoding and
/// the boundary content type to the host, so `encode_form` supplies both.
fn execute(req: HttpRequest) -> HttpResponse {
    let agent = ureq::Agent::config_builder()
        .http_status_as_error(false)
        .build()
        .new_agent();

    let mut headers = req.headers.clone();
    let body = match req.body {
        None => None,
        Some(RequestBody::Json(text)) => Some(text.into_bytes()),
        Some(RequestBody::Multipart(form)) => {
            let (content_type, body) = encode_form(form);
            headers.push(("Content-Type".to_string(), content_type));
            Some(body)
        }
    };

    let mut response = match (req.method, body) {
        (HttpMethod::Get, _) => with_headers(agent.get(&req.url), &headers).call(),
        (HttpMethod::Delete, Some(body)) => with_headers(agent.delete(&req.url), &headers)
            .force_send_body()
            .send(body.as_slice()),
        (HttpMethod::Delete, None) => with_headers(agent.delete(&req.url), &headers).call(),
        (HttpMethod::Post, Some(body)) => with_headers(agent.post(&req.url), &headers).send(body.as_slice()),
        (HttpMethod::Post, None) => with_headers(agent.post(&req.url), &headers).send_empty(),
        (HttpMethod::Put, Some(body)) => with_headers(agent.put(&req.url), &headers).send(body.as_slice()),
        (HttpMethod::Put, None) => with_headers(agent.put(&req.url), &headers).send_empty(),
        (HttpMethod::Patch, Some(body)) => with_headers(agent.patch(&req.url), &headers).send(body.as_slice()),
        (HttpMethod::Patch, None) => with_headers(agent.patch(&req.url), &headers).send_empty(),
    }
    .expect("HTTP transport error");

    let status = response.status().as_u16();
    let body = response.body_mut().read_to_string().unwrap_or_default();

    HttpResponse {
        status,
        headers: Vec::new(),
        body,
    }
}

fn data(reply: Reply) -> market_client::Body {
    reply.data().expect("expected data, got auth redirect")
}

#[test]
fn marketplace_lifecycle() {
    // Step 1: start mock server on a random port.
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    let mut client = ApiClient::configure(&format!("http://{addr}/api")).unwrap();
    let here = "/dashboard/products";

    // Step 2: public endpoint works without a credential.
    let req = client.build_get("/public/hello", &Params::new());
    let body = data(client.parse(execute(req), here).unwrap());
    assert!(body.value()["message"].is_string());

    // Step 3: creating without a credential asks for login.
    let input = CreateProduct {
        name: "bowl".to_string(),
        price: 12.5,
        description: None,
    };
    let req = client.build_post("/products", &input).unwrap();
    let reply = client.parse(execute(req), here).unwrap();
    assert_eq!(
        reply,
        Reply::AuthRequired {
            redirect_path: "/auth/login?redirect=%2Fdashboard%2Fproducts".to_string()
        }
    );

    // Step 4: with a credential the server knows who we are.
    client.set_credential(Some("artisan-1"));
    let req = client.build_get("/auth/me", &Params::new());
    let user: CurrentUser = data(client.parse(execute(req), here).unwrap()).decode().unwrap();
    assert_eq!(user.uid, "artisan-1");

    // Step 5: create a product.
    let req = client.build_post("/products", &input).unwrap();
    let created: Product = data(client.parse(execute(req), here).unwrap()).decode().unwrap();
    assert_eq!(created.name, "bowl");
    let id = created.id;

    // Step 6: invalid price is rejected with the server's message.
    let bad = CreateProduct {
        name: "cup".to_string(),
        price: 0.0,
        description: None,
    };
    let req = client.build_post("/products", &bad).unwrap();
    let err = client.parse(execute(req), here).unwrap_err();
    assert_eq!(err.status(), Some(422));
    assert_eq!(err.message(), "Invalid price");
    assert!(matches!(
        err,
        ApiError::Status { ref error_type, .. } if error_type.as_deref() == Some("validation_error")
    ));

    // Step 7: list with an absent filter.
    let query = Params::new().set("page", 2).set_opt("filter", None::<&str>);
    let req = client.build_get("/products", &query);
    assert!(req.url.ends_with("/products?page=2"));
    let listing = data(client.parse(execute(req), here).unwrap()).into_value();
    assert_eq!(listing["page"], 2);
    assert_eq!(listing["filter"], Value::Null);
    assert_eq!(listing["items"].as_array().unwrap().len(), 1);

    // Step 8: patch the price.
    let patch = UpdateProduct {
        price: Some(18.0),
        ..Default::default()
    };
    let req = client.build_patch(&format!("/products/{id}"), &patch).unwrap();
    let updated: Product = data(client.parse(execute(req), here).unwrap()).decode().unwrap();
    assert_eq!(updated.price, 18.0);
    assert_eq!(updated.name, "bowl");

    // Step 9: replace it.
    let replacement = CreateProduct {
        name: "mug".to_string(),
        price: 9.0,
        description: Some("stoneware".to_string()),
    };
    let req = client.build_put(&format!("/products/{id}"), &replacement).unwrap();
    let replaced: Product = data(client.parse(execute(req), here).unwrap()).decode().unwrap();
    assert_eq!(replaced.description.as_deref(), Some("stoneware"));

    // Step 10: upload a photo for it.
    let photo = FileUpload::new("mug.jpg", b"JPEGDATA".to_vec()).with_content_type("image/jpeg");
    let req = client.build_upload("/uploads", photo, "photo", &Params::new().set("productId", id));
    assert_eq!(req.header("content-type"), None);
    let receipt: UploadReceipt = data(client.parse(execute(req), here).unwrap()).decode().unwrap();
    assert_eq!(receipt.files.len(), 1);
    assert_eq!(receipt.files[0].field, "photo");
    assert_eq!(receipt.files[0].size, 8);
    assert_eq!(receipt.fields["productId"], id.to_string());

    // Step 11: an HTML 500 reads as an empty body with the fallback message.
    let req = client.build_get("/broken", &Params::new());
    let err = client.parse(execute(req), here).unwrap_err();
    let ApiError::Status { status, message, body, .. } = err else {
        panic!("expected status error");
    };
    assert_eq!(status, 500);
    assert_eq!(message, "An error occurred");
    assert!(!body.is_parsed());
    assert_eq!(body.value(), json!({}));

    // Step 12: delete, then get — not found.
    let req = client.build_delete(&format!("/products/{id}"));
    let deleted = data(client.parse(execute(req), here).unwrap()).into_value();
    assert_eq!(deleted["deleted"], id);

    let req = client.build_get(&format!("/products/{id}"), &Params::new());
    let err = client.parse(execute(req), here).unwrap_err();
    assert!(err.is_not_found());

    // Step 13: bulk delete carries its id list in the DELETE body.
    let req = client.build_post("/products", &input).unwrap();
    let kept: Product = data(client.parse(execute(req), here).unwrap()).decode().unwrap();
    let req = client.build_post("/products", &input).unwrap();
    let dropped: Product = data(client.parse(execute(req), here).unwrap()).decode().unwrap();

    let req = client
        .build_delete_with("/products", &json!({"ids": [dropped.id, id]}))
        .unwrap();
    assert!(req.body.is_some());
    let removed = data(client.parse(execute(req), here).unwrap()).into_value();
    assert_eq!(removed["deleted"], json!([dropped.id]));

    let req = client.build_get("/products", &Params::new());
    let listing = data(client.parse(execute(req), here).unwrap()).into_value();
    assert_eq!(listing["items"], json!([kept]));

    // Step 14: clearing the credential removes the header on the wire.
    client.set_credential(None);
    let req = client.build_get("/echo/headers", &Params::new());
    let echoed = data(client.parse(execute(req), here).unwrap()).into_value();
    assert!(echoed.get("authorization").is_none());
    assert_eq!(echoed["x-requested-with"], "XMLHttpRequest");
}
