use axum::{
    response::Html,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use super::{api, AppState};

pub async fn start_server(state: AppState, port: u16) -> anyhow::Result<()> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(serve_form))
        .route("/api/health", get(api::health_check))
        .route("/api/predict", post(api::post_predict))
        .route("/api/reload", post(api::post_reload))
        .layer(cors)
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Prediction server starting on http://localhost:{}", port);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn serve_form() -> Html<&'static str> {
    Html(FORM_HTML)
}

const FORM_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Market Trend Predictor</title>
    <style>
        * { margin: 0; padding: 0; box-sizing: border-box; }
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            background: #0f1419;
            color: #e7e9ea;
            min-height: 100vh;
            padding: 2rem;
        }
        h1 { color: #1da1f2; margin-bottom: 1.5rem; }
        .card {
            background: #16202a;
            border: 1px solid #2f3336;
            border-radius: 12px;
            padding: 1.5rem;
            max-width: 720px;
        }
        .grid { display: grid; grid-template-columns: repeat(3, 1fr); gap: 1rem; }
        @media (max-width: 768px) { .grid { grid-template-columns: 1fr; } }
        label { display: block; font-size: 0.8rem; color: #8b98a5; margin-bottom: 0.25rem; }
        input {
            width: 100%;
            padding: 0.5rem;
            background: #0f1419;
            border: 1px solid #2f3336;
            border-radius: 6px;
            color: #e7e9ea;
        }
        button {
            margin-top: 1.5rem;
            padding: 0.6rem 2rem;
            background: #1da1f2;
            border: none;
            border-radius: 6px;
            color: #fff;
            font-size: 1rem;
            cursor: pointer;
        }
        #result { margin-top: 1.5rem; font-size: 1.1rem; }
        .bearish { color: #f4212e; }
        .stable { color: #8b98a5; }
        .bullish { color: #00ba7c; }
        .error { color: #f4212e; }
        .probs { font-size: 0.9rem; color: #8b98a5; margin-top: 0.5rem; }
    </style>
</head>
<body>
    <h1>Market Trend Predictor</h1>
    <div class="card">
        <form id="predict-form">
            <div class="grid" id="fields"></div>
            <button type="submit">Predict Trend</button>
        </form>
        <div id="result"></div>
    </div>
    <script>
        const FIELDS = [
            ["Open", "Opening Price"], ["High", "High Price"], ["Low", "Low Price"],
            ["Close", "Closing Price"], ["Volume", "Volume"], ["Market_Cap", "Market Cap"],
            ["PE_Ratio", "PE Ratio"], ["Dividend_Yield", "Dividend Yield"],
            ["Volatility", "Volatility"], ["Sentiment_Score", "Sentiment Score (-1 to 1)"],
            ["MA5", "5-day Moving Average"], ["MA20", "20-day Moving Average"],
        ];
        const grid = document.getElementById('fields');
        for (const [name, label] of FIELDS) {
            const div = document.createElement('div');
            div.innerHTML = `<label for="${name}">${label}</label>
                <input id="${name}" name="${name}" type="number" step="any" required>`;
            grid.appendChild(div);
        }
        document.getElementById('predict-form').addEventListener('submit', async (e) => {
            e.preventDefault();
            const body = {};
            for (const [name] of FIELDS) {
                body[name] = parseFloat(document.getElementById(name).value);
            }
            const result = document.getElementById('result');
            try {
                const resp = await fetch('/api/predict', {
                    method: 'POST',
                    headers: { 'Content-Type': 'application/json' },
                    body: JSON.stringify(body),
                });
                const data = await resp.json();
                if (!resp.ok) {
                    result.innerHTML = `<span class="error">${data.error}</span>`;
                    return;
                }
                const p = data.probabilities;
                result.innerHTML = `Predicted trend:
                    <strong class="${data.trend.toLowerCase()}">${data.trend}</strong>
                    <div class="probs">
                        Bearish ${(p.Bearish * 100).toFixed(1)}% &middot;
                        Stable ${(p.Stable * 100).toFixed(1)}% &middot;
                        Bullish ${(p.Bullish * 100).toFixed(1)}%
                    </div>`;
            } catch (err) {
                result.innerHTML = `<span class="error">${err}</span>`;
            }
        });
    </script>
</body>
</html>"##;
