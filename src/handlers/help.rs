use axum::{
    http::{header, HeaderMap, Uri},
    response::{IntoResponse, Response},
};

use crate::http::request::request_host;

/// Usage text; `{host}` is replaced with the host the client addressed.
pub const USAGE: &str = "
query/form params:
\tsleep        : sleep n ms before response header, eg: sleep=100
\tsleep_ah     : sleep n ms after response header before body, eg: sleep_ah=100
\thttp_code    : http status code, eg: http_code=500
\tcontent_type : content type, eg: content_type=text/html;charset=utf-8
\trepeat       : repeat content times, eg: repeat=10
\tbroken       : broken this connect, eg: broken=1
\ttype         : data output type, allow: [json,xml], eg: type=json

visit url:
\thttp://{host}/?sleep=100
\thttp://{host}/?sleep=100&http_code=500&repeat=1
\thttp://{host}/cal/sum?ids=123,456
\thttp://{host}/chunk?&http_code=500&repeat=1
\thttp://{host}/status
";

pub fn render_usage(host: &str) -> String {
    USAGE.replace("{host}", host)
}

pub async fn help(headers: HeaderMap, uri: Uri) -> Response {
    let host = request_host(&headers, &uri);
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        render_usage(&host),
    )
        .into_response()
}
